pub mod inventory_level;
pub mod product;
pub mod stock_movement;
