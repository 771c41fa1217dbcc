//! Source/destination address assignment from message text.

use indexmap::IndexSet;

use crate::patterns::{first_capture, LABELED_DST_IP, LABELED_SRC_IP};

/// Labeled patterns (`src=`, `dst=`, `orig_h=`...) first. When neither side is
/// labeled, fall back to position: one address is the source, two or more
/// are source then destination.
pub fn src_dst(message: &str, ips: &IndexSet<String>) -> (Option<String>, Option<String>) {
    let src = first_capture(&LABELED_SRC_IP, message);
    let dst = first_capture(&LABELED_DST_IP, message);
    if src.is_some() || dst.is_some() {
        return (src, dst);
    }

    let mut positional = ips.iter().cloned();
    (positional.next(), positional.next())
}
