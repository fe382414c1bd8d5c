pub mod audit;
pub mod candidates;
pub mod confidence;
pub mod db;
pub mod decision;
pub mod engine;
pub mod hierarchy;
pub mod manager;
pub mod matcher;
pub mod numbered;
