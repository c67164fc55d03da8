pub mod engagement;
pub mod page;
pub mod post;
pub mod text;
pub mod user;
