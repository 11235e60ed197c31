//! Guest OS identifiers
//!
//! The REST API reports a VM's guest OS as an upper-case enum (`CENTOS_64`),
//! while the property collector reports `guestId` (`centos64Guest`). Both name
//! the same `VirtualMachineGuestOsIdentifier`; the REST form is derived from
//! the vSphere one by splitting camel case and digit runs on `_`. [`vim_guest_id`]
//! undoes that split so group names match what the property collector returns.

/// Identifiers whose casing cannot be recovered from the REST form
const IRREGULAR: &[(&str, &str)] = &[
    ("OTHER_GUEST", "otherGuest"),
    ("OTHER_GUEST_64", "otherGuest64"),
    ("WINDOWS_HYPERV", "windowsHyperVGuest"),
    ("WIN_NT", "winNTGuest"),
    ("WIN_XP_HOME", "winXPHomeGuest"),
    ("WIN_XP_PRO", "winXPProGuest"),
    ("WIN_XP_PRO_64", "winXPPro64Guest"),
    ("WINDOWS_2019SRVNEXT_64", "windows2019srvNext_64Guest"),
    ("WINDOWS_2022SRVNEXT_64", "windows2022srvNext_64Guest"),
    ("ECOMSTATION", "eComStationGuest"),
    ("ECOMSTATION_2", "eComStation2Guest"),
    ("CRXPOD_1", "crxPod1Guest"),
    ("CRXSYS_1", "crxSys1Guest"),
    ("ROCKYLINUX_64", "rockylinux_64Guest"),
    ("ALMALINUX_64", "almalinux_64Guest"),
];

/// Convert a REST `GuestOS` value into the vSphere `guestId`
///
/// Values that already contain lower-case letters are assumed to be in
/// vSphere form and are returned unchanged.
#[must_use]
pub fn vim_guest_id(rest: &str) -> String {
    if rest.chars().any(|c| c.is_ascii_lowercase()) {
        return rest.to_string();
    }
    if let Some((_, vim)) = IRREGULAR.iter().find(|(name, _)| *name == rest) {
        return (*vim).to_string();
    }

    let mut id = String::with_capacity(rest.len() + 5);
    let mut after_digit = false;
    for (i, token) in rest.split('_').filter(|t| !t.is_empty()).enumerate() {
        let lower = token.to_ascii_lowercase();
        if token.chars().all(|c| c.is_ascii_digit()) {
            // "SLES_11_64" is sles11_64, "WINDOWS_9_SERVER_64" is windows9Server64
            if after_digit {
                id.push('_');
            }
            id.push_str(&lower);
        } else if i == 0 || token.starts_with(|c: char| c.is_ascii_digit()) {
            id.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                id.push(first.to_ascii_uppercase());
                id.push_str(chars.as_str());
            }
        }
        after_digit = token.chars().any(|c| c.is_ascii_digit());
    }
    id.push_str("Guest");
    id
}
