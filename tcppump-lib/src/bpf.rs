/// A compiled packet filter, expressed the way `libpcap`'s BPF filters are:
/// a human-readable expression compiled once and then matched per-packet.
/// Compilation is an OS/library collaborator's job (e.g. `libpcap` on the
/// binary-crate side); the core only ever consumes the trait.
pub trait BpfFilter: Send {
    fn matches(&self, frame: &[u8]) -> bool;
}

/// A filter that accepts every frame, used where no `-F`/receive filter was
/// requested.
pub struct AcceptAll;

impl BpfFilter for AcceptAll {
    fn matches(&self, _frame: &[u8]) -> bool {
        true
    }
}
