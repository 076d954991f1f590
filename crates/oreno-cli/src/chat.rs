mod render;
mod run;
mod view;

pub use run::{run, Banner};
