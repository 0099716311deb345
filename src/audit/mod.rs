pub mod editor;
pub mod evidence;
pub mod report;
pub mod scoping;

#[cfg(test)]
pub(crate) mod testing;

pub use evidence::{AssigneeResponses, ResponseHook};
pub use report::{Logo, ReportRenderer};
