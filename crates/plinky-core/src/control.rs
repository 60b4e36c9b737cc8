//! Reconciliation of desired relay states against a status snapshot.
//!
//! These functions decide which writes are needed; they never talk to the
//! device. [`DeviceExt::set_relay`](crate::DeviceExt::set_relay) and
//! [`DeviceExt::set_socket_relays`](crate::DeviceExt::set_socket_relays)
//! apply the plan.

use crate::{error::Error, response::Sysinfo};

/// Returns true if a single-relay device must be written to reach `on`.
pub fn relay_needs_write(status: &Sysinfo, on: bool) -> bool {
    status.is_on() != on
}

/// Plans the per-socket writes that bring `sockets` to `on`.
///
/// Every index is validated before anything is planned, so an out-of-range
/// index yields no writes at all. Sockets already in the desired state are
/// skipped and repeated indices are planned once. The returned child ids are
/// in first-seen order.
///
/// ```
/// use plinky_core::{Child, Sysinfo, control::plan_socket_writes};
///
/// let status = Sysinfo {
///     children: vec![
///         Child { id: "A".into(), state: 1, ..Default::default() },
///         Child { id: "B".into(), state: 0, ..Default::default() },
///     ],
///     ..Default::default()
/// };
/// assert_eq!(plan_socket_writes(&status, true, &[0, 1]).unwrap(), vec!["B"]);
/// ```
pub fn plan_socket_writes(
    status: &Sysinfo,
    on: bool,
    sockets: &[usize],
) -> Result<Vec<String>, Error> {
    let count = status.children.len();
    if let Some(&index) = sockets.iter().find(|&&i| i >= count) {
        return Err(Error::SocketOutOfRange { index, count });
    }

    let mut planned: Vec<String> = Vec::new();
    for &index in sockets {
        let child = &status.children[index];
        if child.is_on() == on || planned.contains(&child.id) {
            continue;
        }
        planned.push(child.id.clone());
    }
    Ok(planned)
}

/// All socket indices of a device, `0..children.len()`.
pub fn all_sockets(status: &Sysinfo) -> Vec<usize> {
    (0..status.children.len()).collect()
}
