// Copyright © 2024 Pathway

use assert_matches::assert_matches;

use batchstore_engine::engine::{Commutativity, ParseCommutativityError};

#[test]
fn test_parse_commutativity() -> eyre::Result<()> {
    assert_eq!(
        "commutative".parse::<Commutativity>()?,
        Commutativity::Commutative
    );
    assert_eq!(
        "Non-Commutative".parse::<Commutativity>()?,
        Commutativity::NonCommutative
    );
    assert_eq!(
        " non_commutative ".parse::<Commutativity>()?,
        Commutativity::NonCommutative
    );
    assert_matches!(
        "sometimes".parse::<Commutativity>(),
        Err(ParseCommutativityError(_))
    );
    Ok(())
}

#[test]
fn test_display_round_trips() -> eyre::Result<()> {
    for commutativity in [Commutativity::Commutative, Commutativity::NonCommutative] {
        assert_eq!(commutativity.to_string().parse::<Commutativity>()?, commutativity);
    }
    assert!(Commutativity::Commutative.is_commutative());
    assert!(!Commutativity::NonCommutative.is_commutative());
    Ok(())
}
