pub mod check;
pub mod info;
pub mod print;
pub mod printers;
