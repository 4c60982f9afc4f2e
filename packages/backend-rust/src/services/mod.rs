pub mod adaptive;
pub mod mastery;
pub mod refit;
