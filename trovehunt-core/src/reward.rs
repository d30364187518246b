//! Reward variants and grant dispatch.
//!
//! Rewards are a closed tagged union: one payload per kind, one `grant`
//! entry point. Granting is fire-and-forget; every failure mode here is
//! recoverable at the granularity of a single reward, so the dispatch logs
//! and continues instead of propagating errors to the claim path.

use log::{debug, error, info, warn};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::constants::{DEFAULT_MAX_STACK, MAX_SUBPOOL_DEPTH};
use crate::platform::{
    ActorDirectory, ActorId, Broadcaster, CommandExecutor, CurrencyLedger, ItemIntegration,
    ItemStack, Platform, PotionForm,
};
use crate::sampling::{AmountRange, GaussianRange, MoneyRange};

fn default_weight() -> u32 {
    1
}

fn default_announce() -> bool {
    true
}

fn default_max_stack() -> i64 {
    DEFAULT_MAX_STACK
}

/// Audience of a broadcast message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastScope {
    #[default]
    Server,
    World,
    Radius(f64),
}

/// Per-grant messaging switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrantFlags {
    pub personal_message: bool,
    pub broadcast_message: bool,
    pub scope: BroadcastScope,
}

impl Default for GrantFlags {
    fn default() -> Self {
        Self {
            personal_message: true,
            broadcast_message: false,
            scope: BroadcastScope::Server,
        }
    }
}

impl GrantFlags {
    /// Flags with both channels enabled at the given scope.
    #[must_use]
    pub const fn announcing(scope: BroadcastScope) -> Self {
        Self {
            personal_message: true,
            broadcast_message: true,
            scope,
        }
    }

    /// Flags granting silently on both channels.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            personal_message: false,
            broadcast_message: false,
            scope: BroadcastScope::Server,
        }
    }
}

/// Shared message templates a pool applies to variants without overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MessageTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<String>,
}

impl MessageTemplates {
    /// True when neither template is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.message.is_none() && self.broadcast.is_none()
    }
}

/// Errors surfaced when resolving a nested pool reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubPoolError {
    #[error("unknown reward pool '{0}'")]
    UnknownPool(String),
    #[error("reward pool '{0}' has nothing to draw")]
    Empty(String),
}

/// Lookup-by-id seam for nested pool rewards; the pool directory
/// implements this.
pub trait SubPoolResolver {
    /// Draw one prepared reward from the named pool.
    ///
    /// # Errors
    ///
    /// Returns `SubPoolError` when the id is unknown or the pool is empty.
    fn draw_from(&self, pool_id: &str, rng: &mut dyn RngCore)
    -> Result<PreparedReward, SubPoolError>;
}

/// Collaborator handles a grant needs, borrowed for one dispatch.
pub struct GrantContext<'a> {
    pub ledger: &'a dyn CurrencyLedger,
    pub broadcast: &'a dyn Broadcaster,
    pub console: &'a dyn CommandExecutor,
    pub actors: &'a dyn ActorDirectory,
    pub items: &'a dyn ItemIntegration,
    pub pools: &'a dyn SubPoolResolver,
    depth: u8,
}

impl<'a> GrantContext<'a> {
    /// Build a context from the platform bundle and a pool resolver.
    #[must_use]
    pub fn new(platform: &'a Platform, pools: &'a dyn SubPoolResolver) -> Self {
        Self {
            ledger: platform.ledger.as_ref(),
            broadcast: platform.broadcast.as_ref(),
            console: platform.console.as_ref(),
            actors: platform.actors.as_ref(),
            items: platform.items.as_ref(),
            pools,
            depth: 0,
        }
    }

    fn nested(&self) -> Self {
        Self {
            ledger: self.ledger,
            broadcast: self.broadcast,
            console: self.console,
            actors: self.actors,
            items: self.items,
            pools: self.pools,
            depth: self.depth.saturating_add(1),
        }
    }
}

/// One weighted, typed reward definition inside a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardVariant {
    #[serde(flatten)]
    pub kind: RewardKind,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Personal-message override; falls back to the pool template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Broadcast override; falls back to the pool template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<String>,
    /// When false the reward never broadcasts, regardless of flags.
    #[serde(default = "default_announce")]
    pub announce: bool,
}

impl RewardVariant {
    /// Wrap a kind with a weight and no message overrides.
    #[must_use]
    pub fn new(kind: RewardKind, weight: u32) -> Self {
        Self {
            kind,
            weight,
            message: None,
            broadcast: None,
            announce: true,
        }
    }

    /// Selection weight.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }

    /// Kind tag used in logs and the persisted form.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            RewardKind::Item { .. } => "item",
            RewardKind::Command { .. } => "command",
            RewardKind::Money { .. } => "money",
            RewardKind::Artifact { .. } => "artifact",
            RewardKind::Potion { .. } => "potion",
            RewardKind::SubPool { .. } => "pool",
            RewardKind::Custom { .. } => "custom",
        }
    }

    /// Grant this reward using only the variant's own message overrides.
    pub fn grant(
        &self,
        actor: &ActorId,
        flags: &GrantFlags,
        ctx: &GrantContext<'_>,
        rng: &mut dyn RngCore,
    ) {
        self.grant_impl(
            actor,
            flags,
            self.message.as_deref(),
            self.broadcast.as_deref(),
            ctx,
            rng,
        );
    }

    fn grant_impl(
        &self,
        actor: &ActorId,
        flags: &GrantFlags,
        message: Option<&str>,
        broadcast: Option<&str>,
        ctx: &GrantContext<'_>,
        rng: &mut dyn RngCore,
    ) {
        match &self.kind {
            RewardKind::Item {
                item,
                amount,
                max_stack,
                gaussian,
                attributes,
            } => {
                let sampled = sample_quantity(*amount, gaussian.as_ref(), rng);
                if sampled <= 0 {
                    debug!("item reward '{item}' sampled a non-positive amount, skipping");
                    return;
                }
                for chunk in split_amount(sampled, *max_stack) {
                    let stack = ItemStack {
                        item: item.clone(),
                        amount: chunk,
                        attributes: attributes.clone(),
                    };
                    deliver(ctx, actor, &stack);
                }
                let amount_text = sampled.to_string();
                let subs = [
                    ("{player}", actor.as_str()),
                    ("{item}", item.as_str()),
                    ("{amount}", amount_text.as_str()),
                ];
                self.send_messages(actor, flags, message, broadcast, ctx, &subs);
            }
            RewardKind::Command { commands } => {
                for template in commands {
                    let command = render(template, &[("{player}", actor.as_str())]);
                    ctx.console.run_as_console(&command);
                }
                self.send_messages(
                    actor,
                    flags,
                    message,
                    broadcast,
                    ctx,
                    &[("{player}", actor.as_str())],
                );
            }
            RewardKind::Money { amount } => {
                let sampled = amount.sample(rng);
                ctx.ledger.deposit(actor, sampled);
                let amount_text = format!("{sampled:.2}");
                let subs = [
                    ("{player}", actor.as_str()),
                    ("{amount}", amount_text.as_str()),
                ];
                self.send_messages(actor, flags, message, broadcast, ctx, &subs);
            }
            RewardKind::Artifact {
                count,
                advanced,
                exclusions,
            } => {
                let wanted = count.sample(rng).max(0);
                let mut granted: Vec<String> = Vec::new();
                for _ in 0..wanted {
                    let roll = rng.next_u32();
                    match ctx.items.enchanted_artifact(*advanced, exclusions, roll) {
                        Some(stack) => {
                            granted.push(stack.item.clone());
                            deliver(ctx, actor, &stack);
                        }
                        None => {
                            warn!("artifact integration produced nothing (advanced={advanced})");
                        }
                    }
                }
                info!("granted {} artifacts to {}: {granted:?}", granted.len(), actor.as_str());
                let amount_text = granted.len().to_string();
                let subs = [
                    ("{player}", actor.as_str()),
                    ("{amount}", amount_text.as_str()),
                ];
                self.send_messages(actor, flags, message, broadcast, ctx, &subs);
            }
            RewardKind::Potion { count } => {
                let wanted = count.sample(rng).max(0);
                let mut delivered = 0_i64;
                for _ in 0..wanted {
                    let form = PotionForm::ALL[rng.gen_range(0..PotionForm::ALL.len())];
                    let roll = rng.next_u32();
                    match ctx.items.potion(form, roll) {
                        Some(stack) => {
                            deliver(ctx, actor, &stack);
                            delivered += 1;
                        }
                        None => warn!("potion integration produced nothing for {form:?}"),
                    }
                }
                let amount_text = delivered.to_string();
                let subs = [
                    ("{player}", actor.as_str()),
                    ("{amount}", amount_text.as_str()),
                ];
                self.send_messages(actor, flags, message, broadcast, ctx, &subs);
            }
            RewardKind::SubPool { pool } => {
                if ctx.depth >= MAX_SUBPOOL_DEPTH {
                    error!(
                        "sub-pool '{pool}' exceeded the nesting limit of {MAX_SUBPOOL_DEPTH}, granting nothing"
                    );
                    return;
                }
                match ctx.pools.draw_from(pool, rng) {
                    Ok(drawn) => drawn.grant(actor, flags, &ctx.nested(), rng),
                    Err(err) => error!("sub-pool reward failed: {err}"),
                }
            }
            RewardKind::Custom { item, amount } => {
                let sampled = amount.sample(rng).max(0);
                if sampled == 0 {
                    return;
                }
                match ctx.items.custom_item(item, sampled) {
                    Some(stack) => {
                        deliver(ctx, actor, &stack);
                        let amount_text = sampled.to_string();
                        let subs = [
                            ("{player}", actor.as_str()),
                            ("{item}", item.as_str()),
                            ("{amount}", amount_text.as_str()),
                        ];
                        self.send_messages(actor, flags, message, broadcast, ctx, &subs);
                    }
                    None => warn!("integration item '{item}' is unavailable, granting nothing"),
                }
            }
        }
    }

    fn send_messages(
        &self,
        actor: &ActorId,
        flags: &GrantFlags,
        message: Option<&str>,
        broadcast: Option<&str>,
        ctx: &GrantContext<'_>,
        substitutions: &[(&str, &str)],
    ) {
        if flags.personal_message
            && let Some(template) = message
        {
            ctx.broadcast
                .send_personal(actor, &render(template, substitutions));
        }
        if flags.broadcast_message
            && self.announce
            && let Some(template) = broadcast
        {
            dispatch_broadcast(ctx, actor, flags.scope, &render(template, substitutions));
        }
    }
}

/// Kind tag plus kind-specific payload, persisted as `{"type": …, …}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardKind {
    /// An item stack; amount sampled per the quantity policy, split into
    /// max-stack chunks on delivery.
    Item {
        item: String,
        #[serde(default)]
        amount: AmountRange,
        #[serde(default = "default_max_stack")]
        max_stack: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gaussian: Option<GaussianRange>,
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        attributes: serde_json::Map<String, serde_json::Value>,
    },
    /// Console commands run in order after placeholder substitution.
    Command { commands: Vec<String> },
    /// A sampled deposit into the actor's currency account.
    Money {
        #[serde(default)]
        amount: MoneyRange,
    },
    /// N randomly enchanted artifacts from the item integration.
    Artifact {
        #[serde(default)]
        count: AmountRange,
        #[serde(default)]
        advanced: bool,
        #[serde(default)]
        exclusions: Vec<String>,
    },
    /// N potions of host-chosen type and random container form.
    Potion {
        #[serde(default)]
        count: AmountRange,
    },
    /// Recursive draw from another named pool.
    #[serde(rename = "pool")]
    SubPool { pool: String },
    /// Integration-built item by id.
    Custom {
        item: String,
        #[serde(default)]
        amount: AmountRange,
    },
}

/// A drawn variant with the pool's shared templates already folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReward {
    variant: RewardVariant,
    message: Option<String>,
    broadcast: Option<String>,
}

impl PreparedReward {
    /// Fold pool defaults under the variant's own overrides.
    #[must_use]
    pub fn compose(variant: RewardVariant, defaults: Option<&MessageTemplates>) -> Self {
        let message = variant
            .message
            .clone()
            .or_else(|| defaults.and_then(|d| d.message.clone()));
        let broadcast = variant
            .broadcast
            .clone()
            .or_else(|| defaults.and_then(|d| d.broadcast.clone()));
        Self {
            variant,
            message,
            broadcast,
        }
    }

    /// The drawn variant.
    #[must_use]
    pub const fn variant(&self) -> &RewardVariant {
        &self.variant
    }

    /// Grant with the composed message templates.
    pub fn grant(
        &self,
        actor: &ActorId,
        flags: &GrantFlags,
        ctx: &GrantContext<'_>,
        rng: &mut dyn RngCore,
    ) {
        self.variant.grant_impl(
            actor,
            flags,
            self.message.as_deref(),
            self.broadcast.as_deref(),
            ctx,
            rng,
        );
    }
}

/// Quantity policy: gaussian when attached, uniform otherwise.
pub(crate) fn sample_quantity(
    amount: AmountRange,
    gaussian: Option<&GaussianRange>,
    rng: &mut dyn RngCore,
) -> i64 {
    match gaussian {
        Some(range) => range.sample_rounded(rng),
        None => amount.sample(rng),
    }
}

/// Split a total into max-stack-sized chunks.
fn split_amount(total: i64, max_stack: i64) -> SmallVec<[i64; 4]> {
    let max_stack = max_stack.max(1);
    let mut chunks = SmallVec::new();
    let mut left = total;
    while left > 0 {
        let chunk = left.min(max_stack);
        chunks.push(chunk);
        left -= chunk;
    }
    chunks
}

fn deliver(ctx: &GrantContext<'_>, actor: &ActorId, stack: &ItemStack) {
    if let Some(overflow) = ctx.actors.give_item(actor, stack) {
        ctx.actors.drop_item(actor, &overflow);
    }
}

fn dispatch_broadcast(ctx: &GrantContext<'_>, actor: &ActorId, scope: BroadcastScope, message: &str) {
    match scope {
        BroadcastScope::Server => ctx.broadcast.send_global(message),
        BroadcastScope::World => match ctx.actors.world_of(actor) {
            Some(world) => ctx.broadcast.send_to_world(&world, message),
            None => ctx.broadcast.send_global(message),
        },
        BroadcastScope::Radius(radius) => {
            if let Some(origin) = ctx.actors.position_of(actor) {
                ctx.broadcast.send_to_radius(&origin, radius, message);
            } else {
                debug!("radius broadcast skipped; {} has no position", actor.as_str());
            }
        }
    }
}

fn render(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in substitutions {
        out = out.replace(key, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::WorldPos;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        deposits: Mutex<Vec<f64>>,
        personal: Mutex<Vec<String>>,
        global: Mutex<Vec<String>>,
        commands: Mutex<Vec<String>>,
        given: Mutex<Vec<ItemStack>>,
        dropped: Mutex<Vec<ItemStack>>,
        inventory_space: i64,
    }

    impl CurrencyLedger for Recorder {
        fn deposit(&self, _actor: &ActorId, amount: f64) {
            self.deposits.lock().unwrap().push(amount);
        }
        fn balance(&self, _actor: &ActorId) -> f64 {
            self.deposits.lock().unwrap().iter().sum()
        }
    }

    impl Broadcaster for Recorder {
        fn send_personal(&self, _actor: &ActorId, message: &str) {
            self.personal.lock().unwrap().push(message.to_string());
        }
        fn send_global(&self, message: &str) {
            self.global.lock().unwrap().push(message.to_string());
        }
        fn send_to_world(&self, _world: &str, message: &str) {
            self.global.lock().unwrap().push(message.to_string());
        }
        fn send_to_radius(&self, _origin: &WorldPos, _radius: f64, message: &str) {
            self.global.lock().unwrap().push(message.to_string());
        }
    }

    impl CommandExecutor for Recorder {
        fn run_as_console(&self, command: &str) {
            self.commands.lock().unwrap().push(command.to_string());
        }
    }

    impl ActorDirectory for Recorder {
        fn is_online(&self, _actor: &ActorId) -> bool {
            true
        }
        fn world_of(&self, _actor: &ActorId) -> Option<String> {
            Some("overworld".to_string())
        }
        fn position_of(&self, _actor: &ActorId) -> Option<WorldPos> {
            Some(WorldPos::new("overworld", 0.0, 64.0, 0.0))
        }
        fn actors_in_world(&self, _world: &str) -> Vec<ActorId> {
            Vec::new()
        }
        fn actors_near(&self, _origin: &WorldPos, _radius: f64) -> Vec<ActorId> {
            Vec::new()
        }
        fn give_item(&self, _actor: &ActorId, stack: &ItemStack) -> Option<ItemStack> {
            self.given.lock().unwrap().push(stack.clone());
            let space = self.inventory_space;
            if space >= stack.amount {
                None
            } else {
                Some(ItemStack {
                    amount: stack.amount - space,
                    ..stack.clone()
                })
            }
        }
        fn drop_item(&self, _actor: &ActorId, stack: &ItemStack) {
            self.dropped.lock().unwrap().push(stack.clone());
        }
    }

    impl ItemIntegration for Recorder {
        fn enchanted_artifact(
            &self,
            advanced: bool,
            _exclusions: &[String],
            _variety_roll: u32,
        ) -> Option<ItemStack> {
            Some(ItemStack::new(
                if advanced { "relic_blade" } else { "old_blade" },
                1,
            ))
        }
        fn potion(&self, _form: PotionForm, _variety_roll: u32) -> Option<ItemStack> {
            Some(ItemStack::new("potion", 1))
        }
        fn custom_item(&self, id: &str, amount: i64) -> Option<ItemStack> {
            (id == "known").then(|| ItemStack::new(id, amount))
        }
    }

    struct NoPools;
    impl SubPoolResolver for NoPools {
        fn draw_from(
            &self,
            pool_id: &str,
            _rng: &mut dyn RngCore,
        ) -> Result<PreparedReward, SubPoolError> {
            Err(SubPoolError::UnknownPool(pool_id.to_string()))
        }
    }

    /// Resolver whose pool always re-references itself.
    struct SelfLoop;
    impl SubPoolResolver for SelfLoop {
        fn draw_from(
            &self,
            pool_id: &str,
            _rng: &mut dyn RngCore,
        ) -> Result<PreparedReward, SubPoolError> {
            Ok(PreparedReward::compose(
                RewardVariant::new(
                    RewardKind::SubPool {
                        pool: pool_id.to_string(),
                    },
                    1,
                ),
                None,
            ))
        }
    }

    fn ctx<'a>(recorder: &'a Recorder, pools: &'a dyn SubPoolResolver) -> GrantContext<'a> {
        GrantContext {
            ledger: recorder,
            broadcast: recorder,
            console: recorder,
            actors: recorder,
            items: recorder,
            pools,
            depth: 0,
        }
    }

    #[test]
    fn item_grant_splits_and_drops_overflow() {
        let recorder = Recorder {
            inventory_space: 40,
            ..Recorder::default()
        };
        let pools = NoPools;
        let variant = RewardVariant::new(
            RewardKind::Item {
                item: "emerald".to_string(),
                amount: AmountRange::fixed(100),
                max_stack: 64,
                gaussian: None,
                attributes: serde_json::Map::new(),
            },
            3,
        );
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("alice"),
            &GrantFlags::silent(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        let given = recorder.given.lock().unwrap();
        assert_eq!(
            given.iter().map(|stack| stack.amount).collect::<Vec<_>>(),
            vec![64, 36]
        );
        // 40 of the first chunk fit; the remaining 24 drop at the actor.
        let dropped = recorder.dropped.lock().unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].amount, 24);
    }

    #[test]
    fn command_grant_substitutes_player() {
        let recorder = Recorder::default();
        let pools = NoPools;
        let variant = RewardVariant::new(
            RewardKind::Command {
                commands: vec!["give {player} cake".to_string(), "say hi".to_string()],
            },
            1,
        );
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("bob"),
            &GrantFlags::silent(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        let commands = recorder.commands.lock().unwrap();
        assert_eq!(commands.as_slice(), ["give bob cake", "say hi"]);
    }

    #[test]
    fn money_grant_deposits_and_messages() {
        let recorder = Recorder::default();
        let pools = NoPools;
        let mut variant = RewardVariant::new(
            RewardKind::Money {
                amount: MoneyRange::fixed(12.5),
            },
            1,
        );
        variant.message = Some("you won {amount}".to_string());
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("carol"),
            &GrantFlags::default(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        assert_eq!(recorder.deposits.lock().unwrap().as_slice(), [12.5]);
        assert_eq!(
            recorder.personal.lock().unwrap().as_slice(),
            ["you won 12.50"]
        );
    }

    #[test]
    fn announce_false_suppresses_broadcast() {
        let recorder = Recorder::default();
        let pools = NoPools;
        let mut variant = RewardVariant::new(
            RewardKind::Money {
                amount: MoneyRange::fixed(1.0),
            },
            1,
        );
        variant.broadcast = Some("{player} got rich".to_string());
        variant.announce = false;
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("dave"),
            &GrantFlags::announcing(BroadcastScope::Server),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        assert!(recorder.global.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_sub_pool_grants_nothing() {
        let recorder = Recorder::default();
        let pools = NoPools;
        let variant = RewardVariant::new(
            RewardKind::SubPool {
                pool: "missing".to_string(),
            },
            1,
        );
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("erin"),
            &GrantFlags::default(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        assert!(recorder.given.lock().unwrap().is_empty());
        assert!(recorder.deposits.lock().unwrap().is_empty());
    }

    #[test]
    fn self_referencing_sub_pool_fails_closed() {
        let recorder = Recorder::default();
        let pools = SelfLoop;
        let variant = RewardVariant::new(
            RewardKind::SubPool {
                pool: "loop".to_string(),
            },
            1,
        );
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        // Must terminate at the depth guard instead of overflowing the stack.
        variant.grant(
            &ActorId::new("frank"),
            &GrantFlags::default(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        assert!(recorder.given.lock().unwrap().is_empty());
    }

    #[test]
    fn prepared_reward_prefers_variant_overrides() {
        let defaults = MessageTemplates {
            message: Some("pool says {amount}".to_string()),
            broadcast: Some("pool broadcast".to_string()),
        };
        let mut variant = RewardVariant::new(
            RewardKind::Money {
                amount: MoneyRange::fixed(3.0),
            },
            1,
        );
        variant.message = Some("mine".to_string());
        let prepared = PreparedReward::compose(variant, Some(&defaults));
        assert_eq!(prepared.message.as_deref(), Some("mine"));
        assert_eq!(prepared.broadcast.as_deref(), Some("pool broadcast"));
    }

    #[test]
    fn custom_item_unknown_id_is_soft() {
        let recorder = Recorder::default();
        let pools = NoPools;
        let variant = RewardVariant::new(
            RewardKind::Custom {
                item: "unknown".to_string(),
                amount: AmountRange::fixed(2),
            },
            1,
        );
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        variant.grant(
            &ActorId::new("gary"),
            &GrantFlags::default(),
            &ctx(&recorder, &pools),
            &mut rng,
        );
        assert!(recorder.given.lock().unwrap().is_empty());
    }
}
