pub mod app;
pub mod state;
pub mod streams;
pub mod view;

pub use app::App;
pub use yenitv_api as api;
