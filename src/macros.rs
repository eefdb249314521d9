#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("You must enable at most one of the following features: defmt, log");

cfg_if::cfg_if! {
    if #[cfg(all(feature = "log", test))] {
        macro_rules! net_log {
            (trace, $($arg:expr),*) => { println!($($arg),*) };
            (debug, $($arg:expr),*) => { println!($($arg),*) };
        }
    } else if #[cfg(feature = "log")] {
        macro_rules! net_log {
            (trace, $($arg:expr),*) => { log::trace!($($arg),*) };
            (debug, $($arg:expr),*) => { log::debug!($($arg),*) };
        }
    } else if #[cfg(feature = "defmt")] {
        macro_rules! net_log {
            (trace, $($arg:expr),*) => { defmt::trace!($($arg),*) };
            (debug, $($arg:expr),*) => { defmt::debug!($($arg),*) };
        }
    } else {
        macro_rules! net_log {
            ($level:ident, $($arg:expr),*) => {{ $( let _ = $arg; )* }}
        }
    }
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}
