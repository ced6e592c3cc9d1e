//! k-d tree over surfaces.
//!
//! Split planes are chosen with a surface area heuristic over a bounded set
//! of candidate walls on the node's longest axis. A surface that straddles a
//! wall is registered on both sides. A surface that spans the node's whole
//! extent on the split axis would land in every descendant, so it is kept
//! at the node instead and tested once there ("overlappers").

use std::collections::HashMap;

use ivar_core::{SceneError, SceneResult};
use ivar_math::{Aabb, Ray};

use crate::hittable::{nearest, HitRecord, Hittable};
use crate::surface::Surface;

/// Surfaces per leaf the builder aims for.
pub const LEAF_TARGET: usize = 16;

/// Upper bound on walls evaluated per node.
const MAX_CANDIDATES: usize = 32;

/// Relative cost of stepping through a branch versus testing one surface.
const TRAVERSAL_COST: f64 = 1.0;
const INTERSECT_COST: f64 = 1.5;

/// Subtrees with at least this many surfaces are built on the rayon pool.
const PARALLEL_THRESHOLD: usize = 2048;

#[derive(Debug)]
enum Node {
    Leaf {
        bounds: Aabb,
        surfaces: Vec<u32>,
    },
    Branch {
        bounds: Aabb,
        axis: usize,
        wall: f64,
        overlappers: Vec<u32>,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Shape of a built tree, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
    pub largest_leaf: usize,
    /// Surface references across all leaves and overlapper lists.
    pub references: usize,
    /// Most leaves any single surface was placed in.
    pub worst_duplication: usize,
}

/// Acceleration structure owning every surface of a scene.
#[derive(Debug)]
pub struct Tree {
    surfaces: Vec<Surface>,
    lights: Vec<u32>,
    root: Node,
    stats: TreeStats,
}

impl Tree {
    /// Build the tree. Fails on an empty surface list.
    pub fn new(surfaces: Vec<Surface>) -> SceneResult<Self> {
        if surfaces.is_empty() {
            return Err(SceneError::EmptyScene);
        }
        let boxes: Vec<Aabb> = surfaces.iter().map(|s| s.bounds()).collect();
        let bounds = Aabb::enclosing(&boxes).ok_or(SceneError::EmptyScene)?;

        let n = surfaces.len();
        let max_depth = (8.0 + 1.3 * (n as f64).log2()).round() as usize;
        let ids: Vec<u32> = (0..n as u32).collect();

        let ctx = BuildContext {
            boxes: &boxes,
            max_depth,
        };
        let root = ctx.build(bounds, ids, 0);

        let lights = surfaces
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_light())
            .map(|(i, _)| i as u32)
            .collect();

        let mut counter = HashMap::new();
        let mut stats = TreeStats::default();
        gather_stats(&root, 1, &mut stats, &mut counter);
        stats.worst_duplication = counter.values().copied().max().unwrap_or(0);

        log::debug!(
            "Built tree over {} surfaces: {} nodes, {} leaves, depth {} (limit {}), largest leaf {}, {} references",
            n,
            stats.nodes,
            stats.leaves,
            stats.depth,
            max_depth,
            stats.largest_leaf,
            stats.references
        );
        for (&id, &count) in &counter {
            if count > LEAF_TARGET {
                log::warn!(
                    "Surface {} ({}) landed in {} leaves and should probably not be in the tree",
                    id,
                    surfaces[id as usize].kind(),
                    count
                );
            }
        }

        Ok(Self {
            surfaces,
            lights,
            root,
            stats,
        })
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Emissive surfaces, in input order.
    pub fn lights(&self) -> impl Iterator<Item = &Surface> + '_ {
        self.lights.iter().map(move |&i| &self.surfaces[i as usize])
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn light(&self, index: usize) -> Option<&Surface> {
        self.lights
            .get(index)
            .map(|&i| &self.surfaces[i as usize])
    }
}

impl Hittable for Tree {
    fn intersect(&self, ray: &Ray, max: f64) -> Option<HitRecord<'_>> {
        self.root.intersect(&self.surfaces, ray, max)
    }

    fn bounds(&self) -> Aabb {
        self.root.bounds()
    }
}

struct BuildContext<'a> {
    boxes: &'a [Aabb],
    max_depth: usize,
}

impl BuildContext<'_> {
    /// `ids` are the surfaces overlapping `bounds`.
    fn build(&self, bounds: Aabb, ids: Vec<u32>, depth: usize) -> Node {
        if ids.len() <= LEAF_TARGET || depth >= self.max_depth {
            return Node::Leaf {
                bounds,
                surfaces: ids,
            };
        }

        let axis = bounds.longest_axis();
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        let (overlappers, rest): (Vec<u32>, Vec<u32>) = ids.iter().partition(|&&i| {
            let b = &self.boxes[i as usize];
            b.min[axis] <= lo && b.max[axis] >= hi
        });
        if rest.len() <= LEAF_TARGET {
            return Node::Leaf {
                bounds,
                surfaces: ids,
            };
        }

        let wall = match self.best_wall(&bounds, axis, &rest) {
            Some(wall) => wall,
            None => {
                return Node::Leaf {
                    bounds,
                    surfaces: ids,
                }
            }
        };

        let (left_bounds, right_bounds) = bounds.split(axis, wall);
        let left_ids = self.overlapping(&left_bounds, &rest);
        let right_ids = self.overlapping(&right_bounds, &rest);

        let (left, right) = if rest.len() >= PARALLEL_THRESHOLD {
            rayon::join(
                || self.build(left_bounds, left_ids, depth + 1),
                || self.build(right_bounds, right_ids, depth + 1),
            )
        } else {
            (
                self.build(left_bounds, left_ids, depth + 1),
                self.build(right_bounds, right_ids, depth + 1),
            )
        };

        Node::Branch {
            bounds,
            axis,
            wall,
            overlappers,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn overlapping(&self, bounds: &Aabb, ids: &[u32]) -> Vec<u32> {
        ids.iter()
            .copied()
            .filter(|&i| self.boxes[i as usize].overlaps(bounds))
            .collect()
    }

    /// Cheapest wall by SAH, or None when no split beats a leaf.
    fn best_wall(&self, bounds: &Aabb, axis: usize, ids: &[u32]) -> Option<f64> {
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);

        let mut edges: Vec<f64> = ids
            .iter()
            .flat_map(|&i| {
                let b = &self.boxes[i as usize];
                [b.min[axis], b.max[axis]]
            })
            .filter(|&e| e > lo && e < hi)
            .collect();
        edges.sort_unstable_by(f64::total_cmp);
        edges.dedup();
        if edges.is_empty() {
            return None;
        }

        let step = edges.len().div_ceil(MAX_CANDIDATES);
        let area = bounds.surface_area();
        let leaf_cost = ids.len() as f64 * INTERSECT_COST;

        let mut best: Option<(f64, f64)> = None;
        for &wall in edges.iter().step_by(step) {
            let (left, right) = bounds.split(axis, wall);
            let below = ids
                .iter()
                .filter(|&&i| self.boxes[i as usize].min[axis] <= wall)
                .count();
            let above = ids
                .iter()
                .filter(|&&i| self.boxes[i as usize].max[axis] >= wall)
                .count();
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left.surface_area() / area * below as f64
                        + right.surface_area() / area * above as f64);
            if best.map_or(true, |(c, _)| cost < c) {
                best = Some((cost, wall));
            }
        }

        best.filter(|&(cost, _)| cost < leaf_cost)
            .map(|(_, wall)| wall)
    }
}

impl Node {
    fn bounds(&self) -> Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => *bounds,
        }
    }

    fn intersect<'a>(&self, surfaces: &'a [Surface], ray: &Ray, max: f64) -> Option<HitRecord<'a>> {
        let (near, far) = self.bounds().check(ray)?;
        if near > max {
            return None;
        }
        match self {
            Node::Leaf { surfaces: ids, .. } => {
                nearest(ids.iter().map(|&i| &surfaces[i as usize]), ray, max)
            }
            Node::Branch {
                axis,
                wall,
                overlappers,
                left,
                right,
                ..
            } => {
                let mut best = nearest(overlappers.iter().map(|&i| &surfaces[i as usize]), ray, max);
                let limit = best.map_or(max, |h| h.distance);

                let axis = *axis;
                let (first, second) = if ray.inv_direction()[axis] >= 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                let split = (wall - ray.origin[axis]) * ray.inv_direction()[axis];

                let found = if near >= split {
                    second.intersect(surfaces, ray, limit)
                } else if far.min(limit) <= split {
                    first.intersect(surfaces, ray, limit)
                } else {
                    match first.intersect(surfaces, ray, limit) {
                        Some(hit) if hit.distance <= split => Some(hit),
                        Some(hit) => second.intersect(surfaces, ray, hit.distance).or(Some(hit)),
                        None => second.intersect(surfaces, ray, limit),
                    }
                };
                if found.is_some() {
                    best = found;
                }
                best
            }
        }
    }
}

fn gather_stats(node: &Node, depth: usize, stats: &mut TreeStats, counter: &mut HashMap<u32, usize>) {
    stats.nodes += 1;
    stats.depth = stats.depth.max(depth);
    match node {
        Node::Leaf { surfaces, .. } => {
            stats.leaves += 1;
            stats.largest_leaf = stats.largest_leaf.max(surfaces.len());
            stats.references += surfaces.len();
            for &id in surfaces {
                *counter.entry(id).or_insert(0) += 1;
            }
        }
        Node::Branch {
            overlappers,
            left,
            right,
            ..
        } => {
            stats.references += overlappers.len();
            gather_stats(left, depth + 1, stats, counter);
            gather_stats(right, depth + 1, stats, counter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::SurfaceList;
    use crate::material::{Material, Uniform};
    use ivar_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn gray() -> Arc<Material> {
        Arc::new(Material::from(Uniform::diffuse(0.5, 0.5, 0.5)))
    }

    /// Cubes on a jittered grid, so no two boxes overlap.
    fn random_boxes(rng: &mut StdRng, per_side: usize) -> Vec<Surface> {
        let mat = gray();
        let mut out = Vec::new();
        for x in 0..per_side {
            for y in 0..per_side {
                for z in 0..per_side {
                    let size = rng.gen_range(0.2..0.9);
                    let jitter = (1.0 - size) * 0.5;
                    let c = Vec3::new(x as f64, y as f64, z as f64)
                        + Vec3::new(
                            rng.gen_range(-jitter..jitter),
                            rng.gen_range(-jitter..jitter),
                            rng.gen_range(-jitter..jitter),
                        );
                    let s = if rng.gen_bool(0.5) {
                        Surface::cube(mat.clone())
                    } else {
                        Surface::sphere(mat.clone())
                    };
                    out.push(s.shift(c.x, c.y, c.z).scale(size, size, size).build().unwrap());
                }
            }
        }
        out
    }

    fn collect(node: &Node, into: &mut HashSet<u32>) {
        match node {
            Node::Leaf { surfaces, .. } => into.extend(surfaces.iter().copied()),
            Node::Branch {
                overlappers,
                left,
                right,
                ..
            } => {
                into.extend(overlappers.iter().copied());
                collect(left, into);
                collect(right, into);
            }
        }
    }

    /// Every surface overlapping a node must be held by that subtree or
    /// promoted to an overlapper of one of its ancestors.
    fn check_subtrees(node: &Node, boxes: &[Aabb], promoted: &HashSet<u32>) {
        let mut held = promoted.clone();
        collect(node, &mut held);
        for (i, b) in boxes.iter().enumerate() {
            if b.overlaps(&node.bounds()) {
                assert!(held.contains(&(i as u32)), "surface {} dropped", i);
            }
        }
        if let Node::Branch {
            overlappers,
            left,
            right,
            ..
        } = node
        {
            let mut promoted = promoted.clone();
            promoted.extend(overlappers.iter().copied());
            check_subtrees(left, boxes, &promoted);
            check_subtrees(right, boxes, &promoted);
        }
    }

    /// Grid boxes plus a floor and tall pillars that span whole nodes.
    fn boxes_with_overlappers(rng: &mut StdRng) -> Vec<Surface> {
        let mut surfaces = random_boxes(rng, 7);
        surfaces.push(
            Surface::cube(gray())
                .shift(3.0, -2.0, 3.0)
                .scale(100.0, 1.0, 100.0)
                .build()
                .unwrap(),
        );
        for (x, z) in [(1.5, 1.5), (4.5, 2.5), (2.5, 5.5)] {
            surfaces.push(
                Surface::cube(gray())
                    .shift(x, 3.0, z)
                    .scale(0.3, 40.0, 0.3)
                    .build()
                    .unwrap(),
            );
        }
        surfaces
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(matches!(Tree::new(vec![]), Err(SceneError::EmptyScene)));
    }

    #[test]
    fn test_tree_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let surfaces = random_boxes(&mut rng, 8);
        let tree = Tree::new(surfaces.clone()).unwrap();
        let list = SurfaceList::new(surfaces).unwrap();
        assert!(tree.stats().leaves > 1);

        for _ in 0..2000 {
            let origin = Vec3::new(
                rng.gen_range(-3.0..10.0),
                rng.gen_range(-3.0..10.0),
                rng.gen_range(-3.0..10.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let Some(dir) = ivar_math::unit(dir) else {
                continue;
            };
            let ray = Ray::new(origin, dir);

            let expected = list.intersect(&ray, f64::INFINITY);
            let got = tree.intersect(&ray, f64::INFINITY);
            match (expected, got) {
                (None, None) => {}
                (Some(e), Some(g)) => {
                    let ei = list.surfaces().iter().position(|s| std::ptr::eq(s, e.surface));
                    let gi = tree.surfaces().iter().position(|s| std::ptr::eq(s, g.surface));
                    assert_eq!(ei, gi);
                    assert_eq!(e.distance, g.distance);
                }
                (e, g) => panic!("list {:?} vs tree {:?}", e.map(|h| h.distance), g.map(|h| h.distance)),
            }
        }
    }

    #[test]
    fn test_axis_parallel_rays_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let surfaces = random_boxes(&mut rng, 6);
        let tree = Tree::new(surfaces.clone()).unwrap();
        let list = SurfaceList::new(surfaces).unwrap();

        for dir in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z] {
            for _ in 0..200 {
                let origin = Vec3::new(
                    rng.gen_range(-2.0..7.0),
                    rng.gen_range(-2.0..7.0),
                    rng.gen_range(-2.0..7.0),
                );
                let ray = Ray::new(origin, dir);
                let e = list.intersect(&ray, f64::INFINITY).map(|h| h.distance);
                let g = tree.intersect(&ray, f64::INFINITY).map(|h| h.distance);
                assert_eq!(e, g);
            }
        }
    }

    #[test]
    fn test_every_overlapping_surface_is_kept() {
        let mut rng = StdRng::seed_from_u64(3);
        let surfaces = boxes_with_overlappers(&mut rng);
        let boxes: Vec<Aabb> = surfaces.iter().map(|s| s.bounds()).collect();
        let tree = Tree::new(surfaces).unwrap();

        check_subtrees(&tree.root, &boxes, &HashSet::new());

        let mut held = HashSet::new();
        collect(&tree.root, &mut held);
        assert_eq!(held.len(), boxes.len());
    }

    #[test]
    fn test_overlappers_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(19);
        let surfaces = boxes_with_overlappers(&mut rng);
        let tree = Tree::new(surfaces.clone()).unwrap();
        let list = SurfaceList::new(surfaces).unwrap();

        for _ in 0..4000 {
            let origin = Vec3::new(
                rng.gen_range(-4.0..10.0),
                rng.gen_range(-1.0..10.0),
                rng.gen_range(-4.0..10.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let Some(dir) = ivar_math::unit(dir) else {
                continue;
            };
            let ray = Ray::new(origin, dir);

            let e = list.intersect(&ray, f64::INFINITY);
            let g = tree.intersect(&ray, f64::INFINITY);
            assert_eq!(e.map(|h| h.distance), g.map(|h| h.distance));
            if let (Some(e), Some(g)) = (e, g) {
                let ei = list.surfaces().iter().position(|s| std::ptr::eq(s, e.surface));
                let gi = tree.surfaces().iter().position(|s| std::ptr::eq(s, g.surface));
                assert_eq!(ei, gi);
            }
        }
    }

    #[test]
    fn test_depth_is_bounded() {
        // Identical boxes can never be separated
        let mat = gray();
        let surfaces: Vec<Surface> = (0..200)
            .map(|_| Surface::sphere(mat.clone()).build().unwrap())
            .collect();
        let tree = Tree::new(surfaces).unwrap();
        let limit = (8.0 + 1.3 * 200f64.log2()).round() as usize;
        assert!(tree.stats().depth <= limit + 1);
        assert_eq!(tree.stats().leaves, 1);
    }

    #[test]
    fn test_lights_are_listed() {
        let light = Arc::new(Material::from(Uniform::light(5.0, 5.0, 5.0)));
        let surfaces = vec![
            Surface::sphere(gray()).build().unwrap(),
            Surface::sphere(light.clone()).shift(3.0, 0.0, 0.0).build().unwrap(),
            Surface::cube(light).shift(-3.0, 0.0, 0.0).build().unwrap(),
        ];
        let tree = Tree::new(surfaces).unwrap();
        assert_eq!(tree.light_count(), 2);
        assert_eq!(tree.lights().count(), 2);
        assert!(tree.light(1).is_some());
        assert!(tree.light(2).is_none());
    }

    #[test]
    fn test_respects_max_distance() {
        let mut rng = StdRng::seed_from_u64(5);
        let tree = Tree::new(random_boxes(&mut rng, 4)).unwrap();
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let hit = tree.intersect(&ray, f64::INFINITY).unwrap();
        assert!(tree.intersect(&ray, hit.distance * 0.5).is_none());
    }
}
