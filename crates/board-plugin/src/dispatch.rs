//! Dispatch of report requests into board modules
//!
//! A [`Request`] names one entry point; [`call`] looks it up in a module and
//! runs it. A missing entry point is [`Dispatch::Unsupported`], never an
//! error: boards implement different subsets of the reports.

use crate::error::{BoardError, Result};
use crate::loader::BoardModule;
use std::ffi::CStr;
use std::fmt;

/// Filter arguments for the event log report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLogFilter {
    /// First log index to print
    pub first: u32,
    /// Last log index to print
    pub last: u32,
    /// Print the list of available logs
    pub print_list: bool,
    /// Print sensor readings
    pub print_sensors: bool,
    /// Print raw bit fields
    pub print_bits: bool,
}

impl Default for EventLogFilter {
    fn default() -> Self {
        Self {
            first: 0,
            last: 1,
            print_list: false,
            print_sensors: false,
            print_bits: false,
        }
    }
}

/// A report a board module may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Board identity banner
    BoardInfo,
    /// MAC addresses
    MacInfo,
    /// PHY group status
    PhyInfo,
    /// Security state
    SecInfo,
    /// Verbose FME details
    FmeVerboseInfo,
    /// Boot page selection
    BootInfo,
    /// Flash image versions
    ImageInfo,
    /// BMC event log
    EventLog(EventLogFilter),
}

impl Request {
    /// Exported symbol implementing this request
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::BoardInfo => "print_board_info",
            Self::MacInfo => "print_mac_info",
            Self::PhyInfo => "print_phy_info",
            Self::SecInfo => "print_sec_info",
            Self::FmeVerboseInfo => "print_fme_verbose_info",
            Self::BootInfo => "fpga_boot_info",
            Self::ImageInfo => "fpga_image_info",
            Self::EventLog(_) => "fpga_event_log",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Outcome of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The entry point ran and returned this status (0 = success)
    Completed(i32),
    /// The module has no entry point for the request
    Unsupported,
}

impl Dispatch {
    /// Entry point ran and reported success
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(0))
    }

    /// Convert to a `Result`, folding both failure shapes into errors
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Unsupported` or `BoardError::ReportFailed`.
    pub fn into_result(self, request: &Request) -> Result<()> {
        match self {
            Self::Completed(0) => Ok(()),
            Self::Completed(status) => Err(BoardError::ReportFailed {
                symbol: request.symbol(),
                status,
            }),
            Self::Unsupported => Err(BoardError::Unsupported {
                symbol: request.symbol(),
            }),
        }
    }
}

/// Look up `request` in `module` and run it with `token`
///
/// The module must stay open for the duration of the call; use
/// [`crate::BoardResolver::invoke`] unless that is already guaranteed.
pub fn call(module: &dyn BoardModule, token: &CStr, request: &Request) -> Dispatch {
    let symbol = request.symbol();

    let status = match request {
        Request::EventLog(filter) => {
            let Some(entry) = module.event_log_fn(symbol) else {
                tracing::debug!("Event log is not supported by {}", module.name());
                return Dispatch::Unsupported;
            };
            // SAFETY: entry point resolved from an open module with the
            // fpga_event_log signature; token outlives the call.
            unsafe {
                entry(
                    token.as_ptr(),
                    filter.first,
                    filter.last,
                    filter.print_list,
                    filter.print_sensors,
                    filter.print_bits,
                )
            }
        }
        _ => {
            let Some(entry) = module.report_fn(symbol) else {
                tracing::debug!("No {symbol} entry point in {}", module.name());
                return Dispatch::Unsupported;
            };
            // SAFETY: as above, with the single-token report signature.
            unsafe { entry(token.as_ptr()) }
        }
    };

    if status != 0 {
        tracing::warn!("{symbol} in {} returned {status}", module.name());
    }
    Dispatch::Completed(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{EventLogFn, ReportFn};
    use std::ffi::c_char;

    unsafe extern "C" fn ok_report(_token: *const c_char) -> i32 {
        0
    }

    unsafe extern "C" fn token_len(token: *const c_char) -> i32 {
        i32::try_from(CStr::from_ptr(token).to_bytes().len()).unwrap_or(-1)
    }

    unsafe extern "C" fn span(
        _token: *const c_char,
        first: u32,
        last: u32,
        print_list: bool,
        _print_sensors: bool,
        _print_bits: bool,
    ) -> i32 {
        if print_list {
            -1
        } else {
            i32::try_from(last - first).unwrap_or(-1)
        }
    }

    #[derive(Debug)]
    struct Table {
        reports: Vec<(&'static str, ReportFn)>,
        event_log: Option<EventLogFn>,
    }

    impl BoardModule for Table {
        fn name(&self) -> &str {
            "libboard_table.so"
        }

        fn report_fn(&self, symbol: &str) -> Option<ReportFn> {
            self.reports.iter().find(|(s, _)| *s == symbol).map(|(_, f)| *f)
        }

        fn event_log_fn(&self, _symbol: &str) -> Option<EventLogFn> {
            self.event_log
        }

        fn is_open(&self) -> bool {
            true
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn symbol_names_match_module_exports() {
        assert_eq!(Request::BoardInfo.symbol(), "print_board_info");
        assert_eq!(Request::FmeVerboseInfo.symbol(), "print_fme_verbose_info");
        assert_eq!(Request::BootInfo.symbol(), "fpga_boot_info");
        assert_eq!(
            Request::EventLog(EventLogFilter::default()).symbol(),
            "fpga_event_log"
        );
    }

    #[test]
    fn missing_entry_point_is_unsupported() {
        let module = Table {
            reports: vec![("print_board_info", ok_report as ReportFn)],
            event_log: None,
        };

        assert_eq!(call(&module, c"0000:b1:00.0", &Request::MacInfo), Dispatch::Unsupported);
        assert_eq!(
            call(&module, c"0000:b1:00.0", &Request::EventLog(EventLogFilter::default())),
            Dispatch::Unsupported
        );
        assert!(call(&module, c"0000:b1:00.0", &Request::BoardInfo).is_success());
    }

    #[test]
    fn status_and_token_pass_through() {
        let module = Table {
            reports: vec![("print_phy_info", token_len as ReportFn)],
            event_log: Some(span as EventLogFn),
        };

        assert_eq!(
            call(&module, c"0000:b1:00.0", &Request::PhyInfo),
            Dispatch::Completed(12)
        );

        let filter = EventLogFilter {
            first: 2,
            last: 7,
            ..EventLogFilter::default()
        };
        assert_eq!(
            call(&module, c"x", &Request::EventLog(filter)),
            Dispatch::Completed(5)
        );
    }

    #[test]
    fn failure_and_absence_stay_distinct() {
        let req = Request::SecInfo;
        assert!(matches!(
            Dispatch::Completed(3).into_result(&req),
            Err(BoardError::ReportFailed { status: 3, .. })
        ));
        assert!(matches!(
            Dispatch::Unsupported.into_result(&req),
            Err(BoardError::Unsupported {
                symbol: "print_sec_info"
            })
        ));
        assert!(Dispatch::Completed(0).into_result(&req).is_ok());
    }
}
