//! Weekly leaderboard. The standings are fixed demo data; only the
//! signed-in runner's row is personalised.

use crate::identity::User;
use crate::util::handle_for;

/// Streaks at or above this many days get the fire badge
pub const HOT_STREAK_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub handle: String,
    pub city: String,
    pub distance_km: f64,
    pub streak_days: u32,
    pub pace: String,
    /// Accent colour as RGB
    pub color: (u8, u8, u8),
    pub is_me: bool,
}

impl LeaderboardEntry {
    #[allow(clippy::too_many_arguments)]
    fn new(
        rank: u32,
        name: &str,
        handle: &str,
        city: &str,
        distance_km: f64,
        streak_days: u32,
        pace: &str,
        color: (u8, u8, u8),
    ) -> Self {
        Self {
            rank,
            name: name.to_string(),
            handle: handle.to_string(),
            city: city.to_string(),
            distance_km,
            streak_days,
            pace: pace.to_string(),
            color,
            is_me: false,
        }
    }

    /// Medal for the podium, the plain rank otherwise
    pub fn rank_label(&self) -> String {
        match self.rank {
            1 => "🥇".to_string(),
            2 => "🥈".to_string(),
            3 => "🥉".to_string(),
            n => n.to_string(),
        }
    }

    pub fn streak_label(&self) -> String {
        if self.streak_days >= HOT_STREAK_DAYS {
            format!("🔥 {}d", self.streak_days)
        } else {
            format!("{}d", self.streak_days)
        }
    }

    pub fn avatar(&self) -> char {
        self.name.chars().next().unwrap_or('?')
    }
}

fn standings() -> Vec<LeaderboardEntry> {
    let mut me = LeaderboardEntry::new(4, "You", "@you", "Your City", 60.1, 7, "5:38", (255, 45, 45));
    me.is_me = true;

    vec![
        LeaderboardEntry::new(1, "Arjun Sharma", "@arjun_s", "Hyderabad", 89.4, 14, "5:12", (239, 68, 68)),
        LeaderboardEntry::new(2, "Priya Nair", "@priya_n", "Bangalore", 77.2, 21, "5:28", (59, 130, 246)),
        LeaderboardEntry::new(3, "Karan Mehta", "@karan_m", "Mumbai", 65.8, 9, "5:35", (34, 197, 94)),
        me,
        LeaderboardEntry::new(5, "Sneha Pillai", "@sneha_p", "Chennai", 54.3, 5, "5:47", (245, 158, 11)),
        LeaderboardEntry::new(6, "Ravi Kumar", "@ravi_k", "Pune", 48.9, 3, "5:55", (139, 92, 246)),
        LeaderboardEntry::new(7, "Ananya Bose", "@ananya_b", "Kolkata", 42.1, 11, "6:02", (6, 182, 212)),
        LeaderboardEntry::new(8, "Dev Patel", "@dev_p", "Delhi", 37.7, 2, "6:14", (132, 204, 22)),
    ]
}

/// Rank-ordered rows with the runner's row named after `user`
pub fn leaderboard_for(user: Option<&User>) -> Vec<LeaderboardEntry> {
    let mut rows = standings();
    if let Some(user) = user {
        if let Some(me) = rows.iter_mut().find(|r| r.is_me) {
            me.name = user.display_name().to_string();
            me.handle = handle_for(&me.name);
        }
    }
    rows
}
