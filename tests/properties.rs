use glam::Vec2;
use proptest::prelude::*;
use race_director::consts::{MIN_GAP, PARTICIPANTS};
use race_director::sim::{RaceRng, make_finish_gaps, plan_outcome};
use race_director::{
    DirectorOptions, HeadlessTrack, HostEvent, Lane, Placement, RaceDirector, RacePhase,
    RoundConfig, VirtualHost,
};

const LENGTHS: [f32; PARTICIPANTS] = [96.0, 100.0, 104.0, 108.0];

fn placement_strategy() -> impl Strategy<Value = Placement> {
    prop_oneof![
        (1u8..=4).prop_map(Placement::Place),
        Just(Placement::Dnf),
    ]
}

fn sorted(order: [usize; PARTICIPANTS]) -> [usize; PARTICIPANTS] {
    let mut order = order;
    order.sort_unstable();
    order
}

proptest! {
    #[test]
    fn planned_order_puts_player_in_place(
        seed in "[a-z0-9]{1,12}",
        placement in placement_strategy(),
        player in 0usize..PARTICIPANTS,
    ) {
        let mut rng = RaceRng::from_seed_str(&seed);
        let outcome = plan_outcome(placement, player, &LENGTHS, 10.0, &RoundConfig::default(), &mut rng);

        prop_assert_eq!(sorted(outcome.order), [0, 1, 2, 3]);
        prop_assert_eq!(outcome.order[placement.position()], player);
        match placement {
            Placement::Dnf => {
                prop_assert_eq!(outcome.dnf_index, Some(player));
                let cut = outcome.cut_distance.unwrap_or(f32::MAX);
                prop_assert!(cut < LENGTHS[player]);
            }
            Placement::Place(_) => {
                prop_assert_eq!(outcome.dnf_index, None);
            }
        }
    }

    #[test]
    fn finish_gaps_strictly_increase(
        seed in any::<u64>(),
        placement in placement_strategy(),
        gap_scale in 0.0f32..3.0,
    ) {
        let mut rng = RaceRng::from_seed_str(&seed.to_string());
        let gaps = make_finish_gaps(placement, &mut rng, gap_scale);
        prop_assert_eq!(gaps[0], 0.0);
        for pair in gaps.windows(2) {
            prop_assert!(pair[1] - pair[0] >= MIN_GAP - 1e-6, "gaps {:?}", gaps);
        }
    }

    #[test]
    fn same_seed_same_plan(seed in "[a-z]{1,8}", placement in placement_strategy()) {
        let config = RoundConfig::with_seed(seed.clone());
        let a = plan_outcome(placement, 1, &LENGTHS, 10.0, &config, &mut RaceRng::from_seed_str(&seed));
        let b = plan_outcome(placement, 1, &LENGTHS, 10.0, &config, &mut RaceRng::from_seed_str(&seed));
        prop_assert_eq!(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn dnf_never_passes_cut(seed in "[a-z]{4,10}", player in 0usize..PARTICIPANTS) {
        let lanes: [Lane; PARTICIPANTS] = std::array::from_fn(|i| {
            let y = i as f32;
            Lane::straight(Vec2::new(0.0, y), Vec2::new(LENGTHS[i], y))
        });
        let track = HeadlessTrack::new(&lanes);
        let options = DirectorOptions { lanes, base_speed: 12.0, player_index: player };
        let mut director = RaceDirector::new(options, RoundConfig::with_seed(seed), VirtualHost::new());
        director.attach(track.speed_sink(), track.progress_source());
        director.set_outcome(Placement::Dnf);
        director.prime();
        director.start();

        let result = director.run_headless(&track, 1.0 / 60.0, 60.0);
        prop_assert!(result.is_some());

        let cut = director.outcome().cut_distance.unwrap_or(0.0);
        prop_assert!(track.peak_progress()[player] <= cut + 1e-3);
        prop_assert_eq!(track.arrivals()[player], None);
    }

    #[test]
    fn dnf_holds_cut_with_uneven_frames(
        seed in "[a-z]{4,10}",
        player in 0usize..PARTICIPANTS,
        every in 3u32..9,
        long_frame in 0.02f32..0.2,
    ) {
        let lanes: [Lane; PARTICIPANTS] = std::array::from_fn(|i| {
            let y = i as f32;
            Lane::straight(Vec2::new(0.0, y), Vec2::new(LENGTHS[i], y))
        });
        let track = HeadlessTrack::new(&lanes);
        let options = DirectorOptions { lanes, base_speed: 12.0, player_index: player };
        let mut director = RaceDirector::new(options, RoundConfig::with_seed(seed), VirtualHost::new());
        director.attach(track.speed_sink(), track.progress_source());
        director.set_outcome(Placement::Dnf);
        director.prime();
        director.start();

        // Mostly 60 Hz with a hitch every few frames
        let mut frame = 0u32;
        while director.phase() != RacePhase::Completed && director.host().now() < 60.0 {
            frame += 1;
            let dt = if frame % every == 0 { long_frame } else { 1.0 / 60.0 };
            let events = director.host_mut().advance(dt);
            if events.iter().any(|e| matches!(e, HostEvent::Frame { .. })) {
                track.step(dt);
            }
            for event in events {
                director.dispatch(event);
            }
        }

        prop_assert!(director.result().is_some());
        let cut = director.outcome().cut_distance.unwrap_or(0.0);
        prop_assert!(
            track.peak_progress()[player] <= cut + 1e-3,
            "peak {} past cut {}",
            track.peak_progress()[player],
            cut
        );
    }
}
