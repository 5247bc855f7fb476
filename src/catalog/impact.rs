//! Reference data describing what breaks when a service group is unreachable.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceImpact {
    pub group: &'static str,
    pub impact: &'static str,
    pub symptoms: &'static str,
}

const IMPACTS: &[ServiceImpact] = &[
    ServiceImpact {
        group: "Intune",
        impact: "Devices cannot enroll, check in or receive policies and apps.",
        symptoms: "Enrollment errors, stale compliance state, apps stuck in pending install.",
    },
    ServiceImpact {
        group: "Autopilot",
        impact: "Devices cannot download their deployment profile during OOBE.",
        symptoms: "Standard OOBE shown instead of the organisation branded experience.",
    },
    ServiceImpact {
        group: "Entra ID",
        impact: "Users and devices cannot authenticate or register.",
        symptoms: "Sign-in prompts loop, device join fails, tokens are not issued.",
    },
    ServiceImpact {
        group: "Windows Update",
        impact: "Quality and feature updates cannot be scanned for or downloaded.",
        symptoms: "Update scans fail with connection errors, devices fall behind on patches.",
    },
    ServiceImpact {
        group: "Delivery Optimization",
        impact: "Peer caching is unavailable and downloads fall back to plain HTTP.",
        symptoms: "Higher WAN usage, slower update and app downloads.",
    },
    ServiceImpact {
        group: "Microsoft Store",
        impact: "Store apps cannot be installed or updated through Intune.",
        symptoms: "Store app deployments fail or remain in progress.",
    },
    ServiceImpact {
        group: "Windows Activation",
        impact: "Windows licenses cannot be activated or validated.",
        symptoms: "Activation watermark, subscription activation does not step up the edition.",
    },
    ServiceImpact {
        group: "Defender",
        impact: "Cloud protection, definition updates and sensor reporting stop.",
        symptoms: "Outdated signatures, devices reported as inactive in the security portal.",
    },
    ServiceImpact {
        group: "Microsoft 365 Apps",
        impact: "Office apps cannot install, update or load cloud configuration.",
        symptoms: "Click-to-Run installs fail, policies from the cloud are not applied.",
    },
    ServiceImpact {
        group: "Remote Help",
        impact: "Helpdesk sessions cannot be established.",
        symptoms: "Remote Help app fails to connect or drops immediately.",
    },
    ServiceImpact {
        group: "Push Notifications",
        impact: "Devices are not woken up for immediate policy or app changes.",
        symptoms: "Changes only apply at the next scheduled check-in.",
    },
    ServiceImpact {
        group: "Diagnostics",
        impact: "Telemetry and diagnostic data cannot be uploaded.",
        symptoms: "Missing device health reports and Update Compliance data.",
    },
];

/// Look up the impact entry for a service group, ignoring case.
pub fn lookup(group: &str) -> Option<&'static ServiceImpact> {
    IMPACTS.iter().find(|i| i.group.eq_ignore_ascii_case(group))
}
