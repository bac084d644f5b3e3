pub mod monitor;
pub mod rules;
pub mod session;
pub mod window;
pub mod workspace;

pub use monitor::{Monitor, MonitorRegistry};
pub use rules::{RuleSet, WindowRules};
pub use session::{SavedWindow, Session};
pub use window::{ManagedWindow, WindowId, WindowProps, WindowRegistry};
pub use workspace::{MovePlan, SwitchPlan, Workspace, WorkspaceManager};
