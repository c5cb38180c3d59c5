//! Logging macros that forward to `defmt` on the device and compile away on the host.

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, error, info, warn};

#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($(&$arg,)*);
    }};
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros, reason = "only device tasks log at debug level")]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($(&$arg,)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn_ {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($(&$arg,)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($(&$arg,)*);
    }};
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_imports, reason = "only device tasks log at debug level")]
pub(crate) use debug;
#[cfg(not(feature = "defmt"))]
pub(crate) use {error, info, warn_ as warn};
