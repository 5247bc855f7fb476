//! Compiled-in endpoint table for Microsoft device management services.

use super::{Catalog, CatalogError, CatalogSource};

/// Service group name to endpoint identifiers, in report order.
pub const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    (
        "Intune",
        &[
            "*.manage.microsoft.com",
            "manage.microsoft.com",
            "enterpriseregistration.windows.net",
            "enterpriseenrollment.manage.microsoft.com",
            "portal.manage.microsoft.com",
            "m.manage.microsoft.com",
            "fef.msuc03.manage.microsoft.com",
        ],
    ),
    (
        "Autopilot",
        &[
            "ztd.dds.microsoft.com",
            "cs.dds.microsoft.com",
            "login.live.com",
            "https://*.microsoftaik.azure.net",
            "lgmsapeweu.blob.core.windows.net",
        ],
    ),
    (
        "Entra ID",
        &[
            "login.microsoftonline.com",
            "login.windows.net",
            "graph.microsoft.com",
            "device.login.microsoftonline.com",
            "enterpriseregistration.windows.net",
            "autologon.microsoftazuread-sso.com",
        ],
    ),
    (
        "Windows Update",
        &[
            "*.windowsupdate.com",
            "*.update.microsoft.com",
            "download.windowsupdate.com",
            "http://ctldl.windowsupdate.com",
            "*.delivery.mp.microsoft.com",
            "tsfe.trafficshaping.dsp.mp.microsoft.com",
        ],
    ),
    (
        "Delivery Optimization",
        &[
            "*.do.dsp.mp.microsoft.com",
            "geo.prod.do.dsp.mp.microsoft.com",
            "kv801.prod.do.dsp.mp.microsoft.com",
            "emdl.ws.microsoft.com",
        ],
    ),
    (
        "Microsoft Store",
        &[
            "displaycatalog.mp.microsoft.com",
            "purchase.md.mp.microsoft.com",
            "licensing.mp.microsoft.com",
            "storeedgefd.dsx.mp.microsoft.com",
        ],
    ),
    (
        "Windows Activation",
        &[
            "activation-v2.sls.microsoft.com",
            "validation-v2.sls.microsoft.com",
            "licensing.mp.microsoft.com",
            "go.microsoft.com",
        ],
    ),
    (
        "Defender",
        &[
            "*.wdcp.microsoft.com",
            "*.wd.microsoft.com",
            "winatp-gw-cus.microsoft.com",
            "events.data.microsoft.com",
            "definitionupdates.microsoft.com",
        ],
    ),
    (
        "Microsoft 365 Apps",
        &[
            "officecdn.microsoft.com",
            "*.officeapps.live.com",
            "config.office.com",
            "clients.config.office.net",
            "ecs.office.com",
        ],
    ),
    (
        "Remote Help",
        &[
            "remoteassistance.support.services.microsoft.com",
            "rdprelayv3eastusprod-0.support.services.microsoft.com",
            "remotehelp.microsoft.com",
            "api.flightproxy.skype.com",
        ],
    ),
    (
        "Push Notifications",
        &[
            "*.notify.windows.com",
            "*.wns.windows.com",
            "sinwns1011421.wns.windows.com",
        ],
    ),
    (
        "Diagnostics",
        &[
            "v10c.events.data.microsoft.com",
            "settings-win.data.microsoft.com",
            "watson.telemetry.microsoft.com",
            "13.107.6.152/31",
        ],
    ),
];

/// Catalog source backed by [`BUILTIN_GROUPS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl CatalogSource for BuiltinCatalog {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        let catalog = Catalog::from_groups(
            BUILTIN_GROUPS.iter().map(|(name, endpoints)| {
                (name.to_string(), endpoints.iter().map(|e| e.to_string()).collect())
            }),
        );
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }
}
