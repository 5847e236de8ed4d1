pub mod run;
pub mod simulate;
