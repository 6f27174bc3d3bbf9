use super::*;
use engine_core::features::{global, spatial};

fn board(text: &str) -> Board {
    Board::parse(Rules::tromp_taylor(), text).unwrap()
}

#[test]
fn test_parse_and_display() {
    let b = board(
        "
        .x...
        ..o..
        .....
        ",
    );
    assert_eq!(b.x_size(), 5);
    assert_eq!(b.y_size(), 3);
    assert_eq!(b.stone_at(1, 0), Some(Player::Black));
    assert_eq!(b.stone_at(2, 1), Some(Player::White));
    assert_eq!(b.stone_at(0, 0), None);
    assert_eq!(b.next_player(), Player::Black);
    assert_eq!(b.to_string(), ".x...\n..o..\n.....\n");
}

#[test]
fn test_parse_rejects_bad_input() {
    assert!(matches!(
        Board::parse(Rules::tromp_taylor(), "x?.\n...\n"),
        Err(RulesError::InvalidBoard(_))
    ));
    assert!(matches!(
        Board::parse(Rules::tromp_taylor(), "...\n..\n"),
        Err(RulesError::InvalidBoard(_))
    ));
    // Black corner stone with no liberties
    assert!(matches!(
        Board::parse(Rules::tromp_taylor(), "xo.\no..\n...\n"),
        Err(RulesError::InvalidBoard(_))
    ));
    assert!(Board::new(20, 20, Rules::tromp_taylor()).is_err());
}

#[test]
fn test_empty_board_legal_moves() {
    let b = Board::new(5, 5, Rules::tromp_taylor()).unwrap();
    let moves = b.legal_moves();
    assert_eq!(moves.len(), 26);
    assert_eq!(moves.last(), Some(&Loc::Pass));
}

#[test]
fn test_play_alternates_and_rejects_occupied() {
    let b = Board::new(5, 5, Rules::tromp_taylor()).unwrap();
    let b = b.play(Loc::point(2, 2)).unwrap();
    assert_eq!(b.next_player(), Player::White);
    assert_eq!(b.ply(), 1);
    assert_eq!(b.last_move(), Some(Loc::point(2, 2)));
    assert_eq!(
        b.play(Loc::point(2, 2)),
        Err(RulesError::Occupied(Loc::point(2, 2)))
    );
    assert_eq!(
        b.play(Loc::point(7, 0)),
        Err(RulesError::OffBoard(Loc::point(7, 0)))
    );
    assert!(!b.legal_moves().contains(&Loc::point(2, 2)));
}

#[test]
fn test_capture() {
    let b = board(
        "
        .o...
        oxo..
        .....
        .....
        .....
        ",
    )
    .with_next_player(Player::White);

    let after = b.play(Loc::point(1, 2)).unwrap();
    assert_eq!(after.stone_at(1, 1), None);
    assert_eq!(after.captures_by(Player::White), 1);
    assert_eq!(after.captures_by(Player::Black), 0);
    assert_ne!(b.nn_hash(), after.nn_hash());
}

#[test]
fn test_simple_ko() {
    let b = board(
        "
        .xo..
        xo.o.
        .xo..
        .....
        .....
        ",
    );

    let after = b.play(Loc::point(2, 1)).unwrap();
    assert_eq!(after.stone_at(1, 1), None);
    assert_eq!(after.ko_point(), Some(Loc::point(1, 1)));
    assert_eq!(
        after.play(Loc::point(1, 1)),
        Err(RulesError::KoBanned(Loc::point(1, 1)))
    );
    assert!(!after.legal_moves().contains(&Loc::point(1, 1)));

    // A ko threat elsewhere lifts the ban
    let after = after.play(Loc::point(4, 4)).unwrap();
    assert_eq!(after.ko_point(), None);
    let after = after.play(Loc::point(4, 3)).unwrap();
    assert!(after.is_legal(Loc::point(1, 1)));
}

#[test]
fn test_single_stone_suicide_is_illegal() {
    let b = board(
        "
        .o...
        o....
        .....
        ",
    );
    assert!(b.is_suicide(Loc::point(0, 0), Player::Black));
    assert!(!b.is_suicide(Loc::point(0, 0), Player::White));
    assert_eq!(
        b.play(Loc::point(0, 0)),
        Err(RulesError::Suicide(Loc::point(0, 0)))
    );
    assert!(!b.legal_moves().contains(&Loc::point(0, 0)));
}

#[test]
fn test_multi_stone_suicide_depends_on_rules() {
    let text = "
        x.o..
        oo...
        .....
        ";
    let tt = Board::parse(Rules::tromp_taylor(), text).unwrap();
    assert!(tt.is_suicide(Loc::point(1, 0), Player::Black));
    assert!(tt.legal_moves().contains(&Loc::point(1, 0)));
    let after = tt.play(Loc::point(1, 0)).unwrap();
    assert_eq!(after.stone_at(0, 0), None);
    assert_eq!(after.stone_at(1, 0), None);
    assert_eq!(after.captures_by(Player::White), 2);

    let terr = Board::parse(Rules::simple_territory(), text).unwrap();
    assert!(!terr.legal_moves().contains(&Loc::point(1, 0)));
    assert_eq!(
        terr.play(Loc::point(1, 0)),
        Err(RulesError::Suicide(Loc::point(1, 0)))
    );
}

#[test]
fn test_two_passes_end_the_game() {
    let b = Board::new(5, 5, Rules::tromp_taylor()).unwrap();
    let b = b.play(Loc::Pass).unwrap();
    assert!(b.outcome().is_none());
    let b = b.play(Loc::Pass).unwrap();

    let outcome = b.outcome().unwrap();
    assert_eq!(outcome.winner, Some(Player::White));
    assert!((outcome.white_score - 7.5).abs() < 1e-9);
    assert!(b.legal_moves().is_empty());
    assert_eq!(b.play(Loc::point(0, 0)), Err(RulesError::GameOver));
}

#[test]
fn test_area_and_territory_scoring() {
    let text = "
        .x.o.
        .x.o.
        .x.o.
        .x.o.
        .x.o.
        ";
    let area = Board::parse(Rules::tromp_taylor().with_komi(0.0), text).unwrap();
    assert!((area.final_white_score()).abs() < 1e-9);

    let area = Board::parse(Rules::tromp_taylor().with_komi(0.5), text).unwrap();
    let ended = area.play(Loc::Pass).unwrap().play(Loc::Pass).unwrap();
    assert_eq!(ended.outcome().unwrap().winner, Some(Player::White));

    let terr = Board::parse(Rules::simple_territory().with_komi(-2.0), text).unwrap();
    assert!((terr.final_white_score() + 2.0).abs() < 1e-9);
}

#[test]
fn test_pass_alive_area() {
    let b = board(
        "
        .x.x.
        xxxxx
        .....
        ooooo
        .o.o.
        ",
    );
    let safe = b.safe_area();
    let at = |x: usize, y: usize| safe[y * 5 + x];

    assert_eq!(at(0, 0), Some(Player::Black));
    assert_eq!(at(2, 0), Some(Player::Black));
    assert_eq!(at(1, 1), Some(Player::Black));
    assert_eq!(at(2, 2), None);
    assert_eq!(at(0, 4), Some(Player::White));
    assert_eq!(at(1, 4), Some(Player::White));
    assert_eq!(at(4, 4), Some(Player::White));
}

#[test]
fn test_single_eye_group_is_not_pass_alive() {
    let b = board(
        "
        .x...
        xx...
        .....
        ",
    );
    assert!(b.safe_area().iter().all(|s| s.is_none()));
}

#[test]
fn test_nn_hash_tracks_relevant_state() {
    let b = Board::new(9, 9, Rules::tromp_taylor()).unwrap();
    assert_eq!(b.nn_hash(), b.clone().nn_hash());

    let moved = b.play(Loc::point(4, 4)).unwrap();
    assert_ne!(b.nn_hash(), moved.nn_hash());

    let other_player = b.clone().with_next_player(Player::White);
    assert_ne!(b.nn_hash(), other_player.nn_hash());

    let other_komi = Board::new(9, 9, Rules::tromp_taylor().with_komi(6.5)).unwrap();
    assert_ne!(b.nn_hash(), other_komi.nn_hash());

    let passed = b.play(Loc::Pass).unwrap().with_next_player(Player::Black);
    assert_ne!(b.nn_hash(), passed.nn_hash());
}

#[test]
fn test_fill_nn_inputs() {
    let b = board(
        "
        x....
        .o...
        .....
        .....
        .....
        ",
    );
    let params = NnInputParams {
        next_player: Player::Black,
        draw_equivalent_wins_for_white: 0.5,
    };
    let inputs = b.fill_nn_inputs(&params, 7, 7);

    let on_board: f32 = inputs.plane(spatial::ON_BOARD).iter().sum();
    assert_eq!(on_board, 25.0);
    assert_eq!(inputs.spatial_at(spatial::OWN_STONES, 0, 0), 1.0);
    assert_eq!(inputs.spatial_at(spatial::OPP_STONES, 1, 1), 1.0);
    assert_eq!(inputs.spatial_at(spatial::LIBERTIES_2, 0, 0), 1.0);
    assert_eq!(inputs.spatial_at(spatial::OWN_STONES, 6, 6), 0.0);

    // Black's perspective sees komi as negative
    assert!((inputs.global[global::KOMI] + 7.5 / 20.0).abs() < 1e-6);
    assert_eq!(inputs.global[global::AREA_SCORING], 1.0);

    assert_eq!(inputs.num_legal(), b.legal_moves().len());
    assert!(inputs.legal[Loc::Pass.policy_index(7, 7)]);
    assert!(!inputs.legal[Loc::point(0, 0).policy_index(7, 7)]);

    let white_view = b.fill_nn_inputs(
        &NnInputParams {
            next_player: Player::White,
            draw_equivalent_wins_for_white: 0.5,
        },
        7,
        7,
    );
    assert_eq!(white_view.spatial_at(spatial::OPP_STONES, 0, 0), 1.0);
    assert_eq!(white_view.spatial_at(spatial::OWN_STONES, 1, 1), 1.0);
}

#[test]
fn test_pass_only_position() {
    let b = board(
        "
        .o.o.
        ooooo
        ooooo
        ooooo
        ooooo
        ",
    );
    assert_eq!(b.legal_moves(), vec![Loc::Pass]);
}
