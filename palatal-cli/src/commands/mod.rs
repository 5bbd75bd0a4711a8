pub mod counts;
pub mod run;
