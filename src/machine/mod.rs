pub mod pool_machine;
pub mod roadmap;
pub mod transition;
