//! Built-in functions grouped by palette family

mod conditional;
mod math;
mod text;
mod datetime;
mod typecheck;
mod lookup;
mod constants;

pub use conditional::{If, Switch, Case, Ifs};
pub use math::{Round, Min, Max, Sum, Average, Abs, Ceiling, Floor, Power, Sqrt, Mod};
pub use text::{Length, Concat, Upper, Lower, Trim, Substring, Replace};
pub use datetime::{Now, Today, DateDiff, FormatDate, AddDays, AddMonths, Year, Month, Day};
pub use typecheck::{TypeCheck, IS_EMPTY, IS_NULL, IS_NUMBER, IS_TEXT, IS_BOOLEAN, IS_DATE};
pub use lookup::{Lookup, Index, Filter, Count, In, Distinct};
pub use constants::{Constant, TRUE, FALSE, NULL, BLANK, PI, E};
