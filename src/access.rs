//! Role-based access control.
//!
//! Handlers ask `can(role, action)` (through `AuthUser::require`) before they
//! touch the store. Workers pass the read checks but list endpoints scope
//! their results to the worker's own records.

use crate::model::role::Role;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Action {
    ViewDashboard,
    ViewAnalytics,

    ListProjects,
    ViewProject,
    CreateProject,
    UpdateProject,
    AssignProjectWorkers,
    DeleteProject,

    ListWorkers,
    CreateWorker,
    ListAttendance,
    CheckIn,
    CheckOut,

    ListInventory,
    ViewInventoryItem,
    CreateInventoryItem,
    UpdateInventoryItem,
    DeleteInventoryItem,

    ViewPayrollSummary,
    ListPayroll,
    CreatePayroll,
    UpdatePayroll,

    ListUsers,
    RegisterUser,
}

pub fn can(role: Role, action: Action) -> bool {
    use Action::*;

    match action {
        // any authenticated role
        ViewDashboard | ListProjects | ViewProject | ListAttendance | CheckIn | CheckOut
        | ListInventory | ViewInventoryItem => true,

        ViewAnalytics | CreateProject | UpdateProject | AssignProjectWorkers | ListWorkers
        | CreateInventoryItem | UpdateInventoryItem | ViewPayrollSummary | ListPayroll
        | ListUsers => matches!(role, Role::SiteManager | Role::Admin),

        DeleteProject | DeleteInventoryItem | CreateWorker | CreatePayroll | UpdatePayroll
        | RegisterUser => role == Role::Admin,
    }
}
