//! Economy - money, round rewards and buy validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::equipment::{BuyItem, Loadout, MAX_UTILITY_ITEMS};
use super::events::KillRecord;
use super::soldier::{PlayerNumber, Side};
use crate::config::EconomyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuyError {
    #[error("purchases are only allowed during the buy phase")]
    WrongPhase,

    #[error("soldier index {0} is out of range")]
    SoldierIndexOutOfRange(usize),

    #[error("{item} costs ${price}, only ${money} available")]
    InsufficientFunds {
        item: &'static str,
        price: u32,
        money: u32,
    },

    #[error("{0} is not available to this side")]
    NotForSide(&'static str),

    #[error("{0} is already equipped")]
    AlreadyOwned(&'static str),

    #[error("utility slots are full")]
    UtilityFull,
}

fn item_name(item: BuyItem) -> &'static str {
    match item {
        BuyItem::Weapon(_) => "weapon",
        BuyItem::Armor(_) => "armor",
        BuyItem::Helmet => "helmet",
        BuyItem::DefuseKit => "defuse kit",
        BuyItem::Utility(_) => "utility",
    }
}

/// One player's wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEconomy {
    pub money: u32,
    pub loss_streak: u32,
}

/// What the economy needs to know about a finished round
#[derive(Debug, Clone, Copy)]
pub struct RoundOutcome<'a> {
    pub winner: PlayerNumber,
    pub attacker: PlayerNumber,
    pub bomb_planted: bool,
    pub bomb_defused: bool,
    pub kills: &'a [KillRecord],
}

#[derive(Debug, Clone)]
pub struct Economy {
    config: EconomyConfig,
    players: [PlayerEconomy; 2],
}

impl Economy {
    pub fn new(config: EconomyConfig) -> Self {
        let start = PlayerEconomy {
            money: config.start_money.min(config.max_money),
            loss_streak: 0,
        };
        Self {
            config,
            players: [start; 2],
        }
    }

    pub fn money(&self, player: PlayerNumber) -> u32 {
        self.players[player.index()].money
    }

    pub fn wallet(&self, player: PlayerNumber) -> PlayerEconomy {
        self.players[player.index()]
    }

    /// Back to starting money for both players (side swap)
    pub fn reset(&mut self) {
        let start = self.config.start_money.min(self.config.max_money);
        for p in self.players.iter_mut() {
            p.money = start;
            p.loss_streak = 0;
        }
    }

    fn credit(&mut self, player: PlayerNumber, amount: u32) {
        let max = self.config.max_money;
        let wallet = &mut self.players[player.index()];
        wallet.money = wallet.money.saturating_add(amount).min(max);
    }

    /// Reward for the given consecutive-loss count (1-based)
    pub fn loss_reward(&self, streak: u32) -> u32 {
        let ladder = &self.config.loss_rewards;
        if ladder.is_empty() {
            return 0;
        }
        let idx = (streak.max(1) as usize - 1).min(ladder.len() - 1);
        ladder[idx]
    }

    /// Validate a purchase and apply it to the loadout
    pub fn purchase(
        &mut self,
        player: PlayerNumber,
        side: Side,
        loadout: &mut Loadout,
        item: BuyItem,
    ) -> Result<u32, BuyError> {
        let name = item_name(item);
        match item {
            BuyItem::Weapon(w) if loadout.weapon == w => return Err(BuyError::AlreadyOwned(name)),
            BuyItem::Armor(a) if loadout.armor == a => return Err(BuyError::AlreadyOwned(name)),
            BuyItem::Helmet if loadout.helmet => return Err(BuyError::AlreadyOwned(name)),
            BuyItem::DefuseKit if side != Side::Defender => return Err(BuyError::NotForSide(name)),
            BuyItem::DefuseKit if loadout.defuse_kit => return Err(BuyError::AlreadyOwned(name)),
            BuyItem::Utility(_) if loadout.utility.len() >= MAX_UTILITY_ITEMS => {
                return Err(BuyError::UtilityFull)
            }
            _ => {}
        }

        let price = item.price();
        let wallet = &mut self.players[player.index()];
        if wallet.money < price {
            return Err(BuyError::InsufficientFunds {
                item: name,
                price,
                money: wallet.money,
            });
        }
        wallet.money -= price;

        match item {
            BuyItem::Weapon(w) => loadout.weapon = w,
            BuyItem::Armor(a) => loadout.armor = a,
            BuyItem::Helmet => loadout.helmet = true,
            BuyItem::DefuseKit => loadout.defuse_kit = true,
            BuyItem::Utility(u) => loadout.utility.push(u),
        }
        Ok(wallet.money)
    }

    /// Pay out round rewards and return what each player received
    pub fn settle_round(&mut self, outcome: &RoundOutcome<'_>) -> [u32; 2] {
        let mut payout = [0u32; 2];
        let loser = outcome.winner.other();

        payout[outcome.winner.index()] += self.config.win_reward;
        self.players[outcome.winner.index()].loss_streak = 0;

        let streak = {
            let wallet = &mut self.players[loser.index()];
            wallet.loss_streak = (wallet.loss_streak + 1).min(self.config.loss_rewards.len() as u32);
            wallet.loss_streak
        };
        payout[loser.index()] += self.loss_reward(streak);

        for kill in outcome.kills {
            // Team kills earn nothing
            if kill.killer.owner() == kill.victim.owner() {
                continue;
            }
            payout[kill.killer_owner().index()] += kill.weapon.kill_reward();
        }

        if outcome.bomb_planted {
            payout[outcome.attacker.index()] += self.config.plant_bonus;
        }
        if outcome.bomb_defused {
            payout[outcome.attacker.other().index()] += self.config.defuse_bonus;
        }

        for player in PlayerNumber::ALL {
            self.credit(player, payout[player.index()]);
        }
        payout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::{ArmorKind, DamageSource, UtilityKind, WeaponKind};
    use crate::game::soldier::SoldierId;

    fn economy() -> Economy {
        Economy::new(EconomyConfig::default())
    }

    fn kill(killer: u8, victim: u8, weapon: WeaponKind) -> KillRecord {
        KillRecord {
            killer: SoldierId(killer),
            victim: SoldierId(victim),
            weapon: DamageSource::Weapon(weapon),
            headshot: false,
            tick: 1,
        }
    }

    #[test]
    fn starting_money() {
        let e = economy();
        assert_eq!(e.money(PlayerNumber::One), 800);
        assert_eq!(e.money(PlayerNumber::Two), 800);
    }

    #[test]
    fn purchases_deduct_and_equip() {
        let mut e = economy();
        let mut loadout = Loadout::default();
        let left = e
            .purchase(PlayerNumber::One, Side::Attacker, &mut loadout, BuyItem::Helmet)
            .unwrap();
        assert_eq!(left, 450);
        assert!(loadout.helmet);
        assert_eq!(
            e.purchase(PlayerNumber::One, Side::Attacker, &mut loadout, BuyItem::Helmet),
            Err(BuyError::AlreadyOwned("helmet"))
        );
    }

    #[test]
    fn insufficient_funds_leave_state_untouched() {
        let mut e = economy();
        let mut loadout = Loadout::default();
        let err = e
            .purchase(
                PlayerNumber::One,
                Side::Attacker,
                &mut loadout,
                BuyItem::Weapon(WeaponKind::Awp),
            )
            .unwrap_err();
        assert!(matches!(err, BuyError::InsufficientFunds { .. }));
        assert_eq!(e.money(PlayerNumber::One), 800);
        assert_eq!(loadout, Loadout::default());
    }

    #[test]
    fn defuse_kits_are_defender_only() {
        let mut e = economy();
        let mut loadout = Loadout::default();
        assert_eq!(
            e.purchase(PlayerNumber::One, Side::Attacker, &mut loadout, BuyItem::DefuseKit),
            Err(BuyError::NotForSide("defuse kit"))
        );
        assert!(e
            .purchase(PlayerNumber::Two, Side::Defender, &mut loadout, BuyItem::DefuseKit)
            .is_ok());
    }

    #[test]
    fn utility_is_capped() {
        let mut e = economy();
        let mut loadout = Loadout {
            utility: vec![UtilityKind::Smoke; MAX_UTILITY_ITEMS],
            ..Default::default()
        };
        assert_eq!(
            e.purchase(
                PlayerNumber::One,
                Side::Attacker,
                &mut loadout,
                BuyItem::Utility(UtilityKind::Flashbang)
            ),
            Err(BuyError::UtilityFull)
        );
    }

    #[test]
    fn loss_ladder_climbs_and_caps() {
        let mut e = economy();
        let mut received = Vec::new();
        for _ in 0..7 {
            let payout = e.settle_round(&RoundOutcome {
                winner: PlayerNumber::One,
                attacker: PlayerNumber::One,
                bomb_planted: false,
                bomb_defused: false,
                kills: &[],
            });
            received.push(payout[1]);
        }
        assert_eq!(received, vec![1400, 1900, 2400, 2900, 3400, 3400, 3400]);
        assert_eq!(e.money(PlayerNumber::One), 16_000);
    }

    #[test]
    fn win_resets_the_loss_streak() {
        let mut e = economy();
        let lose = |e: &mut Economy, winner| {
            e.settle_round(&RoundOutcome {
                winner,
                attacker: PlayerNumber::One,
                bomb_planted: false,
                bomb_defused: false,
                kills: &[],
            })
        };
        lose(&mut e, PlayerNumber::One);
        lose(&mut e, PlayerNumber::One);
        lose(&mut e, PlayerNumber::Two);
        assert_eq!(e.wallet(PlayerNumber::Two).loss_streak, 0);
        assert_eq!(lose(&mut e, PlayerNumber::Two)[0], 1900);
    }

    #[test]
    fn kills_and_objective_bonuses() {
        let mut e = economy();
        let kills = vec![
            kill(0, 5, WeaponKind::Rifle),
            kill(6, 1, WeaponKind::Pistol),
            // team kill, no reward
            kill(2, 3, WeaponKind::Rifle),
        ];
        let payout = e.settle_round(&RoundOutcome {
            winner: PlayerNumber::Two,
            attacker: PlayerNumber::One,
            bomb_planted: true,
            bomb_defused: true,
            kills: &kills,
        });
        let rifle = WeaponKind::Rifle.stats().kill_reward;
        let pistol = WeaponKind::Pistol.stats().kill_reward;
        assert_eq!(payout[0], 1400 + rifle + 300);
        assert_eq!(payout[1], 3250 + pistol + 300);
    }

    #[test]
    fn reset_restores_start_money() {
        let mut e = economy();
        let mut loadout = Loadout::default();
        e.purchase(
            PlayerNumber::One,
            Side::Attacker,
            &mut loadout,
            BuyItem::Armor(ArmorKind::Kevlar),
        )
        .ok();
        e.reset();
        assert_eq!(e.money(PlayerNumber::One), 800);
    }
}
