pub mod clock;
pub mod codegen;
pub mod db_utils;
pub mod error;
pub mod money;
