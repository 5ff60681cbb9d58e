use std::collections::HashMap;

use ndarray::prelude::*;
use proptest::prelude::*;
use tilecipher::{
    generate, partition, reassemble, rng_from_seed, shuffle, shuffle_frame, unshuffle,
    unshuffle_frame, GridSpec, OriginForm, PermutationReader, PermutationWriter, SidecarFormat,
};

fn frame_strategy() -> impl Strategy<Value = (Array3<u8>, usize)> {
    (2usize..6, 1usize..5, 1usize..5, 1usize..4).prop_flat_map(|(g, tw, th, c)| {
        let (w, h) = (g * tw + 1, g * th + 1);
        prop::collection::vec(any::<u8>(), w * h * c).prop_map(move |data| {
            let frame = Array3::from_shape_vec((h, w, c), data).expect("shape matches data");
            (frame, g)
        })
    })
}

fn multiset(tiles: &[Array3<u8>]) -> HashMap<Vec<u8>, usize> {
    let mut counts = HashMap::new();
    for t in tiles {
        *counts.entry(t.iter().copied().collect()).or_default() += 1;
    }
    counts
}

proptest! {
    #[test]
    fn prop_roundtrip_identity((frame, g) in frame_strategy(), seed in any::<u64>()) {
        let grid = GridSpec::for_frame(&frame.view(), g).unwrap();
        let origin = generate(grid.tile_count(), &mut rng_from_seed(Some(&seed.to_string()))).unwrap();

        let tiles = partition(frame.view(), &grid).unwrap();
        let plain = reassemble(&tiles, &grid).unwrap();
        let restored = unshuffle(shuffle(tiles, &origin).unwrap(), &origin).unwrap();
        prop_assert_eq!(reassemble(&restored, &grid).unwrap(), plain);
    }

    #[test]
    fn prop_fused_roundtrip((frame, g) in frame_strategy(), seed in any::<u64>()) {
        let grid = GridSpec::for_frame(&frame.view(), g).unwrap();
        let origin = generate(grid.tile_count(), &mut rng_from_seed(Some(&seed.to_string()))).unwrap();

        let encrypted = shuffle_frame(frame.view(), &grid, &origin).unwrap();
        let (eh, ew, _) = encrypted.dim();
        let back_grid = GridSpec::tiled(g, ew, eh).unwrap();
        let decrypted = unshuffle_frame(encrypted.view(), &back_grid, &origin).unwrap();

        let (h, w) = (grid.output_height(), grid.output_width());
        prop_assert_eq!(decrypted, frame.slice(s![..h, ..w, ..]).to_owned());
    }

    #[test]
    fn prop_generated_is_bijection(n in 1usize..2000, seed in any::<u64>()) {
        let perm = generate(n, &mut rng_from_seed(Some(&seed.to_string()))).unwrap();
        let mut sorted = perm.into_inner();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn prop_shuffle_keeps_tile_contents((frame, g) in frame_strategy(), seed in any::<u64>()) {
        let grid = GridSpec::for_frame(&frame.view(), g).unwrap();
        let origin = generate(grid.tile_count(), &mut rng_from_seed(Some(&seed.to_string()))).unwrap();

        let tiles = partition(frame.view(), &grid).unwrap();
        let before = multiset(&tiles);
        let shuffled = shuffle(tiles, &origin).unwrap();
        prop_assert_eq!(multiset(&shuffled), before);
    }

    #[test]
    fn prop_store_read_symmetry(g in 2usize..6, frames in 0usize..8, seed in any::<u64>(), legacy in any::<bool>()) {
        let n = g * g;
        let mut random = rng_from_seed(Some(&seed.to_string()));
        let perms: Vec<OriginForm> = (0..frames).map(|_| generate(n, &mut random).unwrap()).collect();

        let format = if legacy { SidecarFormat::Legacy } else { SidecarFormat::Headered };
        let mut writer = PermutationWriter::new(Vec::new(), g, format).unwrap();
        for p in &perms {
            writer.push(p).unwrap();
        }
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let mut reader = PermutationReader::parse(&text, Some(g)).unwrap();
        prop_assert_eq!(reader.frames(), frames);
        for p in &perms {
            prop_assert_eq!(&reader.next_permutation().unwrap(), p);
        }
        prop_assert!(reader.finish().is_ok());
    }
}

#[test]
fn edge_truncation_is_reproducible() {
    let frame = Array3::from_shape_fn((21, 100, 3), |(y, x, c)| (y * 3 + x + c) as u8);
    let grid = GridSpec::for_frame(&frame.view(), 7).unwrap();
    assert_eq!(grid.tile_width(), 14);
    assert_eq!(grid.output_width(), 98);

    let once = reassemble(&partition(frame.view(), &grid).unwrap(), &grid).unwrap();
    let twice = reassemble(&partition(frame.view(), &grid).unwrap(), &grid).unwrap();
    assert_eq!(once.dim(), (21, 98, 3));
    assert_eq!(once, twice);
    assert_eq!(once, frame.slice(s![.., ..98, ..]));
}

#[test]
fn placement_and_origin_agree_on_frames() {
    let frame = Array3::from_shape_fn((4, 4, 1), |(y, x, _)| (y * 4 + x + 1) as u8);
    let grid = GridSpec::for_frame(&frame.view(), 2).unwrap();
    let origin = OriginForm::new(vec![2, 0, 3, 1]).unwrap();

    let encrypted = shuffle_frame(frame.view(), &grid, &origin).unwrap();
    assert_eq!(
        encrypted,
        array![
            [[3u8], [4], [11], [12]],
            [[7], [8], [15], [16]],
            [[1], [2], [9], [10]],
            [[5], [6], [13], [14]],
        ]
    );

    let placement = origin.to_placement();
    assert_eq!(placement.as_slice(), &[1, 3, 0, 2]);
    assert_eq!(unshuffle_frame(encrypted.view(), &grid, &origin).unwrap(), frame);
}
