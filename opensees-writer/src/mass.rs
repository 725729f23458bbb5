//! Distributed mass lumping
//!
//! Line and surface elements carry a (possibly varying) mass density. It is
//! integrated with the element's Gauss rule and lumped onto the nodes as
//! `N_i * rho * det(J) * w`. Contributions are added to the context
//! accumulator so entities sharing a node sum up.

use nalgebra::Vector3;

use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::ElementFamily;

/// Mass density field over the model
pub trait MassDensity {
    fn at(&self, point: [f64; 3]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityField {
    Uniform(f64),
    /// `value + gradient . (p - origin)`
    Linear {
        origin: [f64; 3],
        value: f64,
        gradient: [f64; 3],
    },
}

impl MassDensity for DensityField {
    fn at(&self, point: [f64; 3]) -> f64 {
        match self {
            DensityField::Uniform(rho) => *rho,
            DensityField::Linear { origin, value, gradient } => {
                let d = Vector3::from(point) - Vector3::from(*origin);
                value + Vector3::from(*gradient).dot(&d)
            }
        }
    }
}

/// Gauss points in natural coordinates with their weights
#[derive(Debug, Clone)]
pub struct IntegrationRule {
    pub points: Vec<([f64; 2], f64)>,
}

impl IntegrationRule {
    pub fn for_family(family: ElementFamily) -> Option<Self> {
        let g2 = 1.0 / 3f64.sqrt();
        let g3 = (3.0f64 / 5.0).sqrt();
        let points = match family {
            ElementFamily::Line2 => vec![([-g2, 0.0], 1.0), ([g2, 0.0], 1.0)],
            ElementFamily::Line3 => vec![
                ([-g3, 0.0], 5.0 / 9.0),
                ([0.0, 0.0], 8.0 / 9.0),
                ([g3, 0.0], 5.0 / 9.0),
            ],
            ElementFamily::Triangle3 => vec![
                ([1.0 / 6.0, 1.0 / 6.0], 1.0 / 6.0),
                ([2.0 / 3.0, 1.0 / 6.0], 1.0 / 6.0),
                ([1.0 / 6.0, 2.0 / 3.0], 1.0 / 6.0),
            ],
            ElementFamily::Quad4 => vec![
                ([-g2, -g2], 1.0),
                ([g2, -g2], 1.0),
                ([g2, g2], 1.0),
                ([-g2, g2], 1.0),
            ],
            ElementFamily::Point | ElementFamily::Tetra4 | ElementFamily::Hexa8 => return None,
        };
        Some(Self { points })
    }
}

/// Shape function values and natural derivatives (d/dxi, d/deta) at `xi`
fn shape_functions(family: ElementFamily, xi: [f64; 2]) -> (Vec<f64>, Vec<[f64; 2]>) {
    let (r, s) = (xi[0], xi[1]);
    match family {
        ElementFamily::Line2 => (
            vec![0.5 * (1.0 - r), 0.5 * (1.0 + r)],
            vec![[-0.5, 0.0], [0.5, 0.0]],
        ),
        // node order: end, end, middle
        ElementFamily::Line3 => (
            vec![0.5 * r * (r - 1.0), 0.5 * r * (r + 1.0), 1.0 - r * r],
            vec![[r - 0.5, 0.0], [r + 0.5, 0.0], [-2.0 * r, 0.0]],
        ),
        ElementFamily::Triangle3 => (
            vec![1.0 - r - s, r, s],
            vec![[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]],
        ),
        ElementFamily::Quad4 => {
            let signs = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
            let n = signs
                .iter()
                .map(|[a, b]| 0.25 * (1.0 + a * r) * (1.0 + b * s))
                .collect();
            let dn = signs
                .iter()
                .map(|[a, b]| [0.25 * a * (1.0 + b * s), 0.25 * b * (1.0 + a * r)])
                .collect();
            (n, dn)
        }
        ElementFamily::Point | ElementFamily::Tetra4 | ElementFamily::Hexa8 => (vec![], vec![]),
    }
}

fn is_line(family: ElementFamily) -> bool {
    matches!(family, ElementFamily::Line2 | ElementFamily::Line3)
}

/// Lumped nodal masses for one element, in node order.
pub fn lumped_masses(
    element: u64,
    family: ElementFamily,
    coords: &[[f64; 3]],
    density: &dyn MassDensity,
) -> EmitResult<Vec<f64>> {
    let rule = IntegrationRule::for_family(family).ok_or_else(|| EmitError::WrongGeometry {
        entity: "distributed mass".into(),
        element,
        reason: format!("{:?} has no line or surface integration rule", family),
    })?;
    if coords.len() != family.node_count() {
        return Err(EmitError::WrongGeometry {
            entity: "distributed mass".into(),
            element,
            reason: format!("expected {} nodes, got {}", family.node_count(), coords.len()),
        });
    }

    let nodes: Vec<Vector3<f64>> = coords.iter().map(|c| Vector3::from(*c)).collect();
    let mut lumped = vec![0.0; nodes.len()];

    for (xi, weight) in &rule.points {
        let (n, dn) = shape_functions(family, *xi);

        let mut position = Vector3::zeros();
        let mut dx_dxi = Vector3::zeros();
        let mut dx_deta = Vector3::zeros();
        for i in 0..nodes.len() {
            position += nodes[i] * n[i];
            dx_dxi += nodes[i] * dn[i][0];
            dx_deta += nodes[i] * dn[i][1];
        }

        let det_j = if is_line(family) {
            dx_dxi.norm()
        } else {
            dx_dxi.cross(&dx_deta).norm()
        };
        if det_j <= 1e-14 {
            return Err(EmitError::InvalidGeometry(format!(
                "element {} is degenerate (det J = {:e})",
                element, det_j
            )));
        }

        let rho = density.at([position.x, position.y, position.z]);
        for i in 0..nodes.len() {
            lumped[i] += n[i] * rho * det_j * weight;
        }
    }

    Ok(lumped)
}

/// Lump one element's distributed mass into the context accumulator.
///
/// `directions` selects the translational components receiving mass.
pub fn lump_distributed_mass(
    ctx: &mut EmissionContext,
    element: u64,
    family: ElementFamily,
    node_ids: &[u64],
    coords: &[[f64; 3]],
    density: &dyn MassDensity,
    directions: [bool; 3],
) -> EmitResult<()> {
    let lumped = lumped_masses(element, family, coords, density)?;
    for (node, mass) in node_ids.iter().zip(lumped) {
        let mut contribution = [0.0; 6];
        for k in 0..3 {
            if directions[k] {
                contribution[k] = mass;
            }
        }
        ctx.add_mass(*node, contribution);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_line_splits_evenly() {
        let coords = [[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]];
        let m = lumped_masses(1, ElementFamily::Line2, &coords, &DensityField::Uniform(2.0)).unwrap();
        assert_relative_eq!(m[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(m[1], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quadratic_line_total_mass() {
        let coords = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let m = lumped_masses(1, ElementFamily::Line3, &coords, &DensityField::Uniform(1.0)).unwrap();
        assert_relative_eq!(m.iter().sum::<f64>(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(m[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m[2], 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tilted_quad_area() {
        // unit square rotated out of plane, area 1
        let s = 1.0 / 2f64.sqrt();
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, s, s], [0.0, s, s]];
        let m = lumped_masses(1, ElementFamily::Quad4, &coords, &DensityField::Uniform(4.0)).unwrap();
        for value in &m {
            assert_relative_eq!(*value, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_triangle_total_mass() {
        let coords = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
        let m = lumped_masses(1, ElementFamily::Triangle3, &coords, &DensityField::Uniform(3.0)).unwrap();
        assert_relative_eq!(m.iter().sum::<f64>(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_field_shifts_mass() {
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let field = DensityField::Linear { origin: [0.0; 3], value: 0.0, gradient: [2.0, 0.0, 0.0] };
        let m = lumped_masses(1, ElementFamily::Line2, &coords, &field).unwrap();
        assert_relative_eq!(m[0] + m[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shared_node_is_summed() {
        let mut ctx = EmissionContext::new("/tmp");
        let rho = DensityField::Uniform(1.0);
        lump_distributed_mass(&mut ctx, 1, ElementFamily::Line2, &[1, 2], &[[0.0; 3], [2.0, 0.0, 0.0]], &rho, [true; 3]).unwrap();
        lump_distributed_mass(&mut ctx, 2, ElementFamily::Line2, &[2, 3], &[[2.0, 0.0, 0.0], [4.0, 0.0, 0.0]], &rho, [true, false, true]).unwrap();
        let shared = ctx.accumulated_mass(2).unwrap();
        assert_relative_eq!(shared[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(shared[1], 1.0, epsilon = 1e-12);
        assert_eq!(&shared[3..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_solid_family_rejected() {
        let coords = [[0.0; 3]; 4];
        let err = lumped_masses(9, ElementFamily::Tetra4, &coords, &DensityField::Uniform(1.0)).unwrap_err();
        assert!(matches!(err, EmitError::WrongGeometry { element: 9, .. }));
    }

    #[test]
    fn test_degenerate_element_rejected() {
        let coords = [[1.0; 3], [1.0; 3]];
        let err = lumped_masses(4, ElementFamily::Line2, &coords, &DensityField::Uniform(1.0)).unwrap_err();
        assert!(matches!(err, EmitError::InvalidGeometry(_)));
    }
}
