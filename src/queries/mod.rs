pub mod inventory_queries;
