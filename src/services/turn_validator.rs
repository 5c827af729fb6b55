use crate::models::Battle;

/// Odd turns belong to player 1, even turns to player 2.
pub fn is_players_turn(battle: &Battle, player_id: &str) -> bool {
    let is_player1 = battle.player1_id == player_id;
    let is_player1_turn = battle.current_turn % 2 == 1;
    if is_player1 {
        is_player1_turn
    } else {
        !is_player1_turn
    }
}

/// Player expected to act at the battle's current turn.
pub fn player_on_turn(battle: &Battle) -> Option<&str> {
    if battle.current_turn % 2 == 1 {
        Some(battle.player1_id.as_str())
    } else {
        battle.player2_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BattleStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn battle_at(turn: i32) -> Battle {
        let now = Utc::now();
        Battle {
            id: Uuid::new_v4(),
            player1_id: "alice".to_string(),
            player2_id: Some("bob".to_string()),
            player1_team_id: Some(Uuid::new_v4()),
            player2_team_id: Some(Uuid::new_v4()),
            current_turn: turn,
            winner_id: None,
            status: BattleStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn turn_one_belongs_to_player_one() {
        let battle = battle_at(1);
        assert!(is_players_turn(&battle, "alice"));
        assert!(!is_players_turn(&battle, "bob"));
        assert_eq!(player_on_turn(&battle), Some("alice"));
    }

    #[test]
    fn exactly_one_player_may_act_and_turns_alternate() {
        let mut previous_alice = false;
        for turn in 1..=50 {
            let battle = battle_at(turn);
            let alice = is_players_turn(&battle, "alice");
            let bob = is_players_turn(&battle, "bob");
            assert_ne!(alice, bob, "turn {turn}");
            if turn > 1 {
                assert_ne!(alice, previous_alice, "turn {turn}");
            }
            previous_alice = alice;
        }
    }

    #[test]
    fn even_turn_belongs_to_player_two() {
        let battle = battle_at(4);
        assert!(is_players_turn(&battle, "bob"));
        assert_eq!(player_on_turn(&battle), Some("bob"));
    }
}
