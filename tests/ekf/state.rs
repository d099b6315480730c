extern crate ekf_derivation;

use ekf_derivation::algebra::{cse, jacobian, TemporaryPool};
use ekf_derivation::context::DerivationContext;
use ekf_derivation::ekf::{NavigationModel, StateBlock, TransitionModel, STATE_SIZE};
use enum_iterator::all;

#[test]
fn state_vector_layout() {
    let mut ctx = DerivationContext::new();
    let nav = NavigationModel::new(&mut ctx);

    let names: Vec<&str> = nav.state.symbols().iter().map(|s| s.name()).collect();
    assert_eq!(names.len(), STATE_SIZE);
    assert_eq!(
        names,
        vec![
            "q0", "q1", "q2", "q3", "vn", "ve", "vd", "pn", "pe", "pd", "dax_b", "day_b", "daz_b",
            "dvx_b", "dvy_b", "dvz_b", "magN", "magE", "magD", "ibx", "iby", "ibz", "vwn", "vwe"
        ]
    );

    let mut offset = 0;
    for block in all::<StateBlock>() {
        assert_eq!(block.offset(), offset, "{block}");
        assert_eq!(block.names(), &names[offset..offset + block.len()]);
        offset += block.len();
    }
    assert_eq!(offset, STATE_SIZE);

    // Shared symbols come first, then the states, then the covariance
    assert_eq!(ctx.names()[0], "dt");
    assert_eq!(ctx.names()[1], "g");
    assert_eq!(ctx.len(), 2 + 6 + 6 + STATE_SIZE + STATE_SIZE * (STATE_SIZE + 1) / 2);
    assert!(ctx.collisions().is_empty());
}

#[test]
fn simplification_round_trip() {
    let mut ctx = DerivationContext::new();
    let nav = NavigationModel::new(&mut ctx);
    let model = TransitionModel::new(&nav).unwrap();

    let mut pool = TemporaryPool::new("PS", 1000);
    let set = cse(model.predicted(), &mut pool).unwrap();
    assert_eq!(set.len(), STATE_SIZE);
    assert!(!set.replacements.is_empty());
    assert_eq!(set.expand(), model.predicted());

    let a = jacobian(model.predicted(), nav.state.symbols());
    let entries: Vec<_> = a.iter().cloned().collect();
    let set = cse(&entries, &mut TemporaryPool::new("PS", 1000)).unwrap();
    assert_eq!(set.expand(), entries);
}
