use super::bc_api::{BCEnum, BCError, BCSpec, BCType, BoundaryCondition, create_bc};
use super::logical_bc::{ASymmBC, SymmBC};
use super::value_bc::{DircBC, NeumBC};
use crate::Mesh::cartesian::MeshBuilder;
use crate::Mesh::elem::StencilPad;
use crate::Mesh::field::{CartesianField, FieldBuilder};
use crate::Mesh::field_api::{DimPos, LocOnMesh, StructuredField};
use crate::Mesh::range::Range;
use approx::assert_relative_eq;

/// 1-D field on `nodes` nodes over [0, 1], value `10*i + 1` at index `i`
fn line_field(nodes: usize, loc: LocOnMesh) -> CartesianField<1> {
    let mesh = MeshBuilder::new_mesh([nodes]).build().unwrap();
    let mut f = FieldBuilder::new()
        .set_mesh(mesh)
        .set_loc([loc])
        .build()
        .unwrap();
    let values: Vec<f64> = (0..f.local_values().len())
        .map(|i| 10.0 * i as f64 + 1.0)
        .collect();
    f.set_local_values(&values).unwrap();
    f
}

#[test]
fn test_center_reflection() {
    // Center field on 5 nodes: accessible [0, 4)
    let f = line_field(5, LocOnMesh::Center);
    let end = SymmBC::new(f.id(), 0, DimPos::End);
    let start = SymmBC::new(f.id(), 0, DimPos::Start);
    assert_eq!(end.evaluate(&f, &[4]).unwrap(), f.value(&[3]).unwrap());
    assert_eq!(end.evaluate(&f, &[5]).unwrap(), f.value(&[2]).unwrap());
    assert_eq!(start.evaluate(&f, &[-1]).unwrap(), f.value(&[0]).unwrap());
    assert_eq!(start.evaluate(&f, &[-3]).unwrap(), f.value(&[2]).unwrap());
}

#[test]
fn test_corner_reflection() {
    // Corner field on 5 nodes: accessible [0, 5), the last node is its own mirror
    let f = line_field(5, LocOnMesh::Corner);
    let end = SymmBC::new(f.id(), 0, DimPos::End);
    assert_eq!(end.evaluate(&f, &[5]).unwrap(), f.value(&[3]).unwrap());
    assert_eq!(end.evaluate(&f, &[4]).unwrap(), f.value(&[4]).unwrap());
    let start = SymmBC::new(f.id(), 0, DimPos::Start);
    assert_eq!(start.evaluate(&f, &[-2]).unwrap(), f.value(&[2]).unwrap());
}

#[test]
fn test_symmetric_and_antisymmetric_sign() {
    let f = line_field(6, LocOnMesh::Center);
    let symm = SymmBC::new(f.id(), 0, DimPos::End);
    let asymm = ASymmBC::new(f.id(), 0, DimPos::End);
    for (ghost, mirror) in [(5, 4), (6, 3), (7, 2)] {
        let expected = f.value(&[mirror]).unwrap();
        assert_eq!(symm.evaluate(&f, &[ghost]).unwrap(), expected);
        assert_eq!(asymm.evaluate(&f, &[ghost]).unwrap(), -expected);
    }
}

#[test]
fn test_antisymmetric_nonzero_on_plane() {
    let mut f = line_field(4, LocOnMesh::Corner);
    let asymm = ASymmBC::new(f.id(), 0, DimPos::End);
    let err = asymm.evaluate(&f, &[3]).unwrap_err();
    assert_eq!(
        err,
        BCError::NonZeroOnBoundary {
            index: vec![3],
            value: "31".to_string()
        }
    );
    f.set_value(&[3], 0.0).unwrap();
    assert_eq!(asymm.evaluate(&f, &[3]).unwrap(), 0.0);
}

#[test]
fn test_reflected_out_of_range() {
    let f = line_field(5, LocOnMesh::Center);
    let start = SymmBC::new(f.id(), 0, DimPos::Start);
    let err = start.evaluate(&f, &[-6]).unwrap_err();
    assert!(matches!(err, BCError::ReflectedOutOfRange { ref reflected, .. } if reflected == &vec![5]));

    // the mirror of the end ghost is owned by another worker
    let mesh = MeshBuilder::new_mesh([5]).build().unwrap();
    let part = FieldBuilder::new()
        .set_mesh(mesh)
        .set_local_range(Range::new([0], [2]))
        .build()
        .unwrap();
    let end = SymmBC::new(part.id(), 0, DimPos::End);
    let err = end.evaluate(&part, &[4]).unwrap_err();
    assert_eq!(
        err,
        BCError::ReflectedOutOfRange {
            index: vec![4],
            reflected: vec![3],
            range: "[(0), (2))".to_string()
        }
    );
}

#[test]
fn test_unbound_and_foreign_field() {
    let f = line_field(5, LocOnMesh::Center);
    let unbound = SymmBC::default();
    assert_eq!(unbound.evaluate(&f, &[-1]).unwrap_err(), BCError::Unbound);

    let g = f.clone();
    let bc = ASymmBC::new(f.id(), 0, DimPos::Start);
    assert_eq!(
        bc.evaluate(&g, &[-1]).unwrap_err(),
        BCError::FieldMismatch {
            bound: f.id(),
            given: g.id()
        }
    );

    let mut rebound = bc.clone();
    rebound.rebind_field(g.id());
    assert_eq!(rebound.evaluate(&g, &[-1]).unwrap(), -g.value(&[0]).unwrap());

    let bad_dim = SymmBC::new(f.id(), 3, DimPos::Start);
    assert_eq!(
        bad_dim.evaluate(&f, &[-1]).unwrap_err(),
        BCError::InvalidDim { dim: 3, dims: 1 }
    );
}

#[test]
fn test_kind_mismatch_on_assign() {
    let f = line_field(5, LocOnMesh::Center);
    let mut symm = create_bc(BCSpec::Symmetric, f.id(), 0, DimPos::End);
    let asymm = create_bc(BCSpec::AntiSymmetric, f.id(), 0, DimPos::End);
    let err = symm.assign_from(&asymm).unwrap_err();
    assert_eq!(
        err,
        BCError::KindMismatch {
            target: "SymmetricBC",
            found: "ASymmetricBC"
        }
    );
    assert_eq!(
        err.to_string(),
        "Trying to assign a ASymmetricBC typed BC to SymmetricBC"
    );
    assert_eq!(symm.bc_type(), BCType::Symm);

    let other = create_bc(BCSpec::Symmetric, f.id(), 0, DimPos::Start);
    symm.assign_from(&other).unwrap();
    assert_eq!(symm.side(), DimPos::Start);
}

#[test]
fn test_copy_is_independent() {
    let f = line_field(5, LocOnMesh::Center);
    let original = create_bc(BCSpec::Dirichlet(2.0), f.id(), 0, DimPos::End);
    let mut copied = original.copy();
    assert_eq!(copied, original);
    if let BCEnum::Dirichlet(d) = &mut copied {
        d.value = 5.0;
    }
    assert_ne!(copied, original);
    assert_eq!(original.evaluate(&f, &[4]).unwrap(), 4.0 - f.value(&[3]).unwrap());
}

#[test]
fn test_describe_indentation() {
    let f = line_field(5, LocOnMesh::Center);
    let bc = create_bc(BCSpec::AntiSymmetric, f.id(), 0, DimPos::End);
    let text = bc.describe(2);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "\t\tType: ASymmetric");
    assert!(lines.iter().all(|l| l.starts_with("\t\t")));
    assert!(lines.contains(&"\t\tSide: end"));
    assert_eq!(bc.type_name(), "ASymmetricBC");
    assert_eq!(BCType::Neum.to_string(), "Neumann");
}

#[test]
fn test_dirichlet_rule() {
    let center = line_field(5, LocOnMesh::Center);
    let d = DircBC::new(center.id(), 0, DimPos::Start, 3.0);
    // ghost -1 mirrors cell 0 across the face at the boundary value
    assert_relative_eq!(d.evaluate(&center, &[-1]).unwrap(), 6.0 - 1.0);

    let corner = line_field(5, LocOnMesh::Corner);
    let d = DircBC::new(corner.id(), 0, DimPos::End, -2.0);
    assert_relative_eq!(d.evaluate(&corner, &[4]).unwrap(), -2.0);
    assert_relative_eq!(d.evaluate(&corner, &[5]).unwrap(), -4.0 - 31.0);
}

#[test]
fn test_neumann_rule() {
    // 5 nodes on [0, 1]: h = 0.25
    let f = line_field(5, LocOnMesh::Center);
    let n = NeumBC::new(f.id(), 0, DimPos::End, 2.0);
    assert_relative_eq!(n.evaluate(&f, &[4]).unwrap(), 31.0 + 2.0 * 0.25);
    assert_relative_eq!(n.evaluate(&f, &[5]).unwrap(), 21.0 + 2.0 * 0.75);
    let n = NeumBC::new(f.id(), 0, DimPos::Start, -1.0);
    assert_relative_eq!(n.evaluate(&f, &[-1]).unwrap(), 1.0 - 0.25);
}

#[test]
fn test_stencil_view_folds_ghosts() {
    let mesh = MeshBuilder::new_mesh([5]).build().unwrap();
    let f = FieldBuilder::new()
        .set_mesh(mesh)
        .set_bc(0, DimPos::Start, BCSpec::AntiSymmetric)
        .set_bc(0, DimPos::End, BCSpec::Dirichlet(1.5))
        .build()
        .unwrap();
    let view = f.stencil_view();
    assert_eq!(view.eval_at(&[-1]).unwrap(), -StencilPad::unit([0]));
    let ghost = view.eval_at(&[4]).unwrap();
    assert_eq!(ghost.coeff(&[3]), -1.0);
    assert_eq!(ghost.bias, 3.0);
}
