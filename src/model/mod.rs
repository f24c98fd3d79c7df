pub mod import_result;
