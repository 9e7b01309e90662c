pub mod camara;

pub use camara::CamaraSource;
