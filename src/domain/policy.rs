//! Route authorization table.
//!
//! Every protected handler names the [`Capability`] it needs; the roles allowed
//! to exercise each capability live here and nowhere else.

use serde::Serialize;

use crate::domain::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewInventory,
    ManageItems,
    AdjustStock,
    RecordSales,
    ViewSales,
    ManageSuppliers,
    ViewReports,
    ManageOrders,
    ManageUsers,
    ManageRecipients,
    TriggerAlerts,
    ViewActivity,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Staff, Role::Ecommerce];
const MANAGEMENT: &[Role] = &[Role::Admin, Role::Manager];
const COUNTER: &[Role] = &[Role::Admin, Role::Manager, Role::Staff];
const FULFILMENT: &[Role] = &[Role::Admin, Role::Manager, Role::Ecommerce];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl Capability {
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Capability::ViewInventory => ALL_ROLES,
            Capability::ManageItems => MANAGEMENT,
            Capability::AdjustStock => COUNTER,
            Capability::RecordSales => COUNTER,
            Capability::ViewSales => COUNTER,
            Capability::ManageSuppliers => MANAGEMENT,
            Capability::ViewReports => MANAGEMENT,
            Capability::ManageOrders => FULFILMENT,
            Capability::ManageUsers => ADMIN_ONLY,
            Capability::ManageRecipients => MANAGEMENT,
            Capability::TriggerAlerts => MANAGEMENT,
            Capability::ViewActivity => ADMIN_ONLY,
        }
    }

    pub fn permits(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}
