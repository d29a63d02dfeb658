pub mod regions;
pub mod track;
