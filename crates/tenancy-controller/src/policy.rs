//! Access-control policy generation.
//!
//! Every tenant gets four project roles. Their policy lines appear both in the
//! tenant's project descriptor and in the tenant's entry of the shared policy
//! document. Rendering is a pure function of the tenant's name, owners and
//! role bindings, so identical input always yields byte-identical text.

use tenancy_core::Tenant;

pub const MAINTAINER_ROLE: &str = "tenant:maintainer";
pub const OPERATOR_ROLE: &str = "tenant:operator";
pub const VIEWER_ROLE: &str = "tenant:viewer";

const ANY: &str = "*";

/// One tier of project access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Owners,
    Maintainers,
    Operators,
    Viewers,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Owners, Tier::Maintainers, Tier::Operators, Tier::Viewers];

    /// Role name inside the project (`proj:<tenant>:<role_name>`).
    pub const fn role_name(self) -> &'static str {
        match self {
            Self::Owners => "owners",
            Self::Maintainers => "maintainers",
            Self::Operators => "operators",
            Self::Viewers => "viewers",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Owners => "Project Owners",
            Self::Maintainers => "Project Maintainers",
            Self::Operators => "Project Operators",
            Self::Viewers => "Project Viewers",
        }
    }

    /// Cluster role a binding must target to place its subjects in this tier.
    /// Owners come from the tenant's owner list instead.
    pub const fn binding_role(self) -> Option<&'static str> {
        match self {
            Self::Owners => None,
            Self::Maintainers => Some(MAINTAINER_ROLE),
            Self::Operators => Some(OPERATOR_ROLE),
            Self::Viewers => Some(VIEWER_ROLE),
        }
    }

    const fn heading(self) -> &'static str {
        match self {
            Self::Owners => "Owner",
            Self::Maintainers => "Maintainer",
            Self::Operators => "Operator",
            Self::Viewers => "Viewer",
        }
    }

    /// (resource, action) pairs granted to the tier, in policy order.
    const fn grants(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Owners => &[
                ("applicationsets", ANY),
                ("applications", ANY),
                ("logs", "get"),
                ("exec", "create"),
                ("repositories", ANY),
            ],
            Self::Maintainers => &[
                ("applicationsets", "get"),
                ("applicationsets", "create"),
                ("applicationsets", "update"),
                ("applicationsets", "sync"),
                ("applicationsets", "override"),
                ("applications", "get"),
                ("applications", "create"),
                ("applications", "update"),
                ("applications", "sync"),
                ("applications", "override"),
                ("repositories", ANY),
                ("logs", "get"),
                ("exec", "create"),
            ],
            Self::Operators => &[
                ("applicationsets", "get"),
                ("applicationsets", "sync"),
                ("applications", "get"),
                ("applications", "sync"),
                ("logs", "get"),
            ],
            Self::Viewers => &[
                ("applications", "get"),
                ("logs", "get"),
                ("repositories", "get"),
            ],
        }
    }

    pub fn policies(self, tenant: &str) -> Vec<String> {
        self.grants()
            .iter()
            .map(|(resource, action)| {
                format!(
                    "p, proj:{tenant}:{}, {resource}, {action}, {tenant}/*, allow",
                    self.role_name()
                )
            })
            .collect()
    }

    /// Principals placed in this tier, in declaration order.
    pub fn principals(self, tenant: &Tenant) -> Vec<String> {
        match self.binding_role() {
            None => tenant.owner_principals().map(str::to_string).collect(),
            Some(role) => tenant.principals_bound_to(role).map(str::to_string).collect(),
        }
    }
}

/// Key of a tenant's entry in the shared policy document.
pub fn policy_key(tenant: &str) -> String {
    format!("policy.{tenant}.csv")
}

/// Renders the policy text stored under [`policy_key`] for `tenant`.
///
/// Only owner and maintainer principals get assignment lines.
pub fn render_policy(tenant: &Tenant) -> String {
    let name = tenant.metadata.name.as_str();
    let mut text = String::new();

    for tier in Tier::ALL {
        push_line(&mut text, &format!("# {}", tier.heading()));
        for line in tier.policies(name) {
            push_line(&mut text, &line);
        }
        text.push('\n');
    }

    push_line(&mut text, "# Assign Owner");
    for principal in tenant.owner_principals() {
        push_line(&mut text, &format!("g, {principal}, role:{name}-tenant-owner"));
    }
    text.push('\n');

    push_line(&mut text, "# Assign Maintainer");
    for principal in tenant.principals_bound_to(MAINTAINER_ROLE) {
        push_line(&mut text, &format!("g, {principal}, role:{name}-tenant-maintainer"));
    }

    text
}

fn push_line(text: &mut String, line: &str) {
    text.push_str(line);
    text.push('\n');
}
