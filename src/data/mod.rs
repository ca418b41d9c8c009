pub mod instrument;
pub mod loader;
pub mod synthetic;
pub mod types;

pub use instrument::IndexInstrument;
pub use loader::{BarLoader, LoaderError};
pub use synthetic::{generate_series, SyntheticSeriesConfig};
pub use types::{
    dec_to_f64, f64_to_dec, Bar, Greeks, OptionContract, OptionQuote, OptionType, OptionsChain,
    Side,
};
