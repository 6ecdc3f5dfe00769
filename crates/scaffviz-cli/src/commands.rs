pub mod columns;
pub mod embed;
pub mod export;
