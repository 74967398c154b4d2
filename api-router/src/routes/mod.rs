pub mod health;
pub mod library;
pub mod load_data;
