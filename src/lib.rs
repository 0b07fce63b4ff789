pub mod app_config;
pub mod auth;
pub mod cache;
pub mod communities;
pub mod db;
pub mod discussions;
pub mod email;
pub mod error;
pub mod events;
pub mod middleware;
pub mod moderation;
pub mod money;
pub mod orm;
pub mod payouts;
pub mod permission;
pub mod photos;
pub mod session;
pub mod storage;
pub mod votes;
pub mod web;
