mod coi;
mod subst;
mod td;

pub use coi::remove_unused;
pub use subst::substitute_constraints;
pub use td::temporal_decomposition;

use crate::seqcirc::SeqCirc;
use log::info;

/// Turn each stashed AIGER output into an extra safety property asserting
/// the output never rises. Outputs are stashed by the reader whenever the
/// file carries explicit bad-state properties.
pub fn extract_safety(sc: &mut SeqCirc) {
    let outs = std::mem::take(&mut sc.outputs);
    if outs.is_empty() {
        return;
    }
    info!("extracting {} extra safety properties from outputs", outs.len());
    for o in outs {
        sc.new_safe_prop(!o);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seqcirc::PropStatus;

    #[test]
    fn outputs_become_good_polarity_properties() {
        let mut sc = SeqCirc::new();
        let o = sc.main.numbered_input(0);
        sc.outputs.push(o);
        extract_safety(&mut sc);
        assert!(sc.outputs.is_empty());
        assert_eq!(sc.safe_props.len(), 1);
        assert_eq!(sc.safe_props[0].sig, !o);
        assert_eq!(sc.safe_props[0].stat, PropStatus::Unknown);
    }
}
