mod common;

use lumen_core::pyramid::GaussianPyramid;
use ndarray::Array2;

use common::noise_plane;

#[test]
fn test_level_dimensions_halve() {
    let image = noise_plane(53, 37, 1);
    let pyramid = GaussianPyramid::build(image, 4);

    assert!(pyramid.num_levels() >= 2);
    for level in 1..pyramid.num_levels() {
        assert_eq!(pyramid.width_at(level), pyramid.width_at(level - 1) / 2);
        assert_eq!(pyramid.height_at(level), pyramid.height_at(level - 1) / 2);
    }
}

#[test]
fn test_level_zero_is_input() {
    let image = noise_plane(16, 16, 2);
    let pyramid = GaussianPyramid::build(image.clone(), 3);
    assert_eq!(pyramid.level(0), &image);
}

#[test]
fn test_constant_image_stays_constant() {
    let image = Array2::from_elem((32, 32), 0.42f32);
    let pyramid = GaussianPyramid::build(image, 4);

    for level in 0..pyramid.num_levels() {
        for &v in pyramid.level(level).iter() {
            assert!((v - 0.42).abs() < 1e-6, "level {level} value {v}");
        }
    }
}

#[test]
fn test_stops_below_minimum_size() {
    // 16 -> 8 -> 4, the next level (2) would be under the 4px floor.
    let pyramid = GaussianPyramid::build(noise_plane(16, 16, 3), 6);
    assert_eq!(pyramid.num_levels(), 3);
    assert_eq!(pyramid.width_at(pyramid.num_levels() - 1), 4);
}

#[test]
fn test_always_at_least_one_level() {
    let pyramid = GaussianPyramid::build(noise_plane(3, 3, 4), 4);
    assert_eq!(pyramid.num_levels(), 1);
}

#[test]
fn test_deterministic_construction() {
    let image = noise_plane(96, 80, 5);
    let a = GaussianPyramid::build(image.clone(), 4);
    let b = GaussianPyramid::build(image, 4);

    assert_eq!(a.num_levels(), b.num_levels());
    for level in 0..a.num_levels() {
        let la = a.level(level);
        let lb = b.level(level);
        assert!(la.iter().zip(lb.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}

#[test]
fn test_level_index_clamped() {
    let pyramid = GaussianPyramid::build(noise_plane(32, 32, 6), 3);
    let last = pyramid.num_levels() - 1;
    assert_eq!(pyramid.level(99), pyramid.level(last));
}
