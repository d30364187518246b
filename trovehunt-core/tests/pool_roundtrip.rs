use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::{Arc, Mutex};
use trovehunt_core::{
    ActorDirectory, ActorId, AmountRange, BlockPos, Broadcaster, CommandExecutor, ContainerError,
    ContainerHandle, ContainerIntegration, CurrencyLedger, GaussianRange, GrantContext,
    GrantFlags, ItemIntegration, ItemStack, MessageTemplates, MoneyRange, Platform, PoolDirectory,
    PotionForm, ProgressIndicator, RewardKind, RewardPool, RewardVariant, SubPoolResolver,
    WorldPos,
};

#[derive(Default)]
struct Sink {
    deposits: Mutex<Vec<f64>>,
    given: Mutex<Vec<ItemStack>>,
}

impl CurrencyLedger for Sink {
    fn deposit(&self, _actor: &ActorId, amount: f64) {
        self.deposits.lock().unwrap().push(amount);
    }
    fn balance(&self, _actor: &ActorId) -> f64 {
        self.deposits.lock().unwrap().iter().sum()
    }
}

impl Broadcaster for Sink {
    fn send_personal(&self, _actor: &ActorId, _message: &str) {}
    fn send_global(&self, _message: &str) {}
    fn send_to_world(&self, _world: &str, _message: &str) {}
    fn send_to_radius(&self, _origin: &WorldPos, _radius: f64, _message: &str) {}
}

impl CommandExecutor for Sink {
    fn run_as_console(&self, _command: &str) {}
}

impl ContainerIntegration for Sink {
    fn materialize(&self, at: &BlockPos, _kind: &str) -> Result<ContainerHandle, ContainerError> {
        Err(ContainerError::new(at, "not a world test"))
    }
    fn destroy(&self, _handle: &ContainerHandle) {}
}

impl ActorDirectory for Sink {
    fn is_online(&self, _actor: &ActorId) -> bool {
        true
    }
    fn world_of(&self, _actor: &ActorId) -> Option<String> {
        None
    }
    fn position_of(&self, _actor: &ActorId) -> Option<WorldPos> {
        None
    }
    fn actors_in_world(&self, _world: &str) -> Vec<ActorId> {
        Vec::new()
    }
    fn actors_near(&self, _origin: &WorldPos, _radius: f64) -> Vec<ActorId> {
        Vec::new()
    }
    fn give_item(&self, _actor: &ActorId, stack: &ItemStack) -> Option<ItemStack> {
        self.given.lock().unwrap().push(stack.clone());
        None
    }
    fn drop_item(&self, _actor: &ActorId, _stack: &ItemStack) {}
}

impl ProgressIndicator for Sink {
    fn show(&self, _bar: &str, _viewer: &ActorId, _label: &str, _fraction: f64) {}
    fn update(&self, _bar: &str, _label: &str, _fraction: f64) {}
    fn hide(&self, _bar: &str, _viewer: &ActorId) {}
}

impl ItemIntegration for Sink {
    fn enchanted_artifact(
        &self,
        _advanced: bool,
        _exclusions: &[String],
        _variety_roll: u32,
    ) -> Option<ItemStack> {
        Some(ItemStack::new("old_blade", 1))
    }
    fn potion(&self, _form: PotionForm, _variety_roll: u32) -> Option<ItemStack> {
        Some(ItemStack::new("potion", 1))
    }
    fn custom_item(&self, id: &str, amount: i64) -> Option<ItemStack> {
        Some(ItemStack::new(id, amount))
    }
}

fn sink_platform() -> (Arc<Sink>, Platform) {
    let sink = Arc::new(Sink::default());
    let platform = Platform {
        ledger: sink.clone(),
        broadcast: sink.clone(),
        console: sink.clone(),
        containers: sink.clone(),
        actors: sink.clone(),
        progress: sink.clone(),
        items: sink.clone(),
    };
    (sink, platform)
}

fn full_pool() -> RewardPool {
    let mut pool = RewardPool::new("everything");
    let mut item = RewardVariant::new(
        RewardKind::Item {
            item: "golden_apple".to_string(),
            amount: AmountRange::new(1, 3),
            max_stack: 16,
            gaussian: Some(GaussianRange {
                mean: 2.0,
                std_dev: 0.5,
                min: Some(1.0),
                max: Some(3.0),
            }),
            attributes: serde_json::Map::from_iter([(
                "glint".to_string(),
                serde_json::Value::Bool(true),
            )]),
        },
        6,
    );
    item.message = Some("you found {amount} {item}".to_string());
    pool.add(item).unwrap();
    pool.add(RewardVariant::new(
        RewardKind::Command {
            commands: vec!["xp give {player} 100".to_string()],
        },
        3,
    ))
    .unwrap();
    pool.add(RewardVariant::new(
        RewardKind::Money {
            amount: MoneyRange {
                min: 0.5,
                max: 2.5,
            },
        },
        5,
    ))
    .unwrap();
    pool.add(RewardVariant::new(
        RewardKind::Artifact {
            count: AmountRange::new(1, 2),
            advanced: true,
            exclusions: vec!["cursed".to_string()],
        },
        2,
    ))
    .unwrap();
    pool.add(RewardVariant::new(
        RewardKind::Potion {
            count: AmountRange::fixed(2),
        },
        2,
    ))
    .unwrap();
    pool.add(RewardVariant::new(
        RewardKind::SubPool {
            pool: "nested".to_string(),
        },
        1,
    ))
    .unwrap();
    pool.add(RewardVariant::new(
        RewardKind::Custom {
            item: "backpack".to_string(),
            amount: AmountRange::fixed(1),
        },
        1,
    ))
    .unwrap();
    pool.set_messages(Some(MessageTemplates {
        message: Some("the pool thanks you".to_string()),
        broadcast: Some("{player} hit the jackpot".to_string()),
    }));
    pool
}

#[test]
fn every_kind_survives_a_round_trip() {
    let pool = full_pool();
    let value = pool.to_value();
    let loaded = RewardPool::from_value(&value).unwrap();

    assert_eq!(loaded.id(), pool.id());
    assert_eq!(loaded.total_weight(), pool.total_weight());
    assert_eq!(loaded.messages(), pool.messages());

    // Same (kind, weight, payload) tuples independent of entry order.
    let mut original = pool.entries().to_vec();
    let mut restored = loaded.entries().to_vec();
    let key = |variant: &RewardVariant| {
        (
            variant.kind_name(),
            variant.weight(),
            serde_json::to_string(variant).unwrap(),
        )
    };
    original.sort_by_key(|variant| key(variant));
    restored.sort_by_key(|variant| key(variant));
    assert_eq!(original, restored);
}

#[test]
fn amount_spans_parse_from_numbers_and_strings() {
    let value = serde_json::json!({
        "id": "amounts",
        "treasures": [
            {"type": "item", "item": "bread", "amount": 4, "weight": 1},
            {"type": "item", "item": "arrow", "amount": "8-16", "weight": 1},
            {"type": "money", "amount": "0.5-2.5", "weight": 1},
        ],
    });
    let pool = RewardPool::from_value(&value).unwrap();
    assert_eq!(pool.len(), 3);
    match &pool.entries()[0].kind {
        RewardKind::Item { amount, .. } => assert_eq!(*amount, AmountRange::fixed(4)),
        other => panic!("expected item, got {other:?}"),
    }
    match &pool.entries()[1].kind {
        RewardKind::Item { amount, .. } => assert_eq!(*amount, AmountRange::new(8, 16)),
        other => panic!("expected item, got {other:?}"),
    }
}

#[test]
fn malformed_entries_do_not_abort_the_load() {
    let value = serde_json::json!({
        "id": "mixed",
        "treasures": [
            {"type": "money", "amount": 3.0, "weight": 2},
            {"type": "wishing_well", "weight": 9},
            {"type": "item", "weight": 1},
            {"type": "command", "commands": ["say hi"], "weight": 4},
        ],
    });
    let pool = RewardPool::from_value(&value).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.total_weight(), 6);
}

#[test]
fn sub_pool_draws_grant_from_the_nested_pool() {
    let (sink, platform) = sink_platform();
    let pools = PoolDirectory::new();
    {
        let nested = pools.get_or_create("nested");
        nested
            .write()
            .unwrap()
            .add(RewardVariant::new(
                RewardKind::Money {
                    amount: MoneyRange::fixed(42.0),
                },
                1,
            ))
            .unwrap();
        let outer = pools.get_or_create("outer");
        outer
            .write()
            .unwrap()
            .add(RewardVariant::new(
                RewardKind::SubPool {
                    pool: "nested".to_string(),
                },
                1,
            ))
            .unwrap();
    }

    let mut rng = SmallRng::seed_from_u64(11);
    let drawn = pools.draw_from("outer", &mut rng).unwrap();
    let ctx = GrantContext::new(&platform, &pools);
    drawn.grant(
        &ActorId::new("alice"),
        &GrantFlags::default(),
        &ctx,
        &mut rng,
    );
    assert_eq!(sink.deposits.lock().unwrap().as_slice(), [42.0]);
}

#[test]
fn missing_sub_pool_reference_grants_nothing() {
    let (sink, platform) = sink_platform();
    let pools = PoolDirectory::new();
    {
        let outer = pools.get_or_create("outer");
        outer
            .write()
            .unwrap()
            .add(RewardVariant::new(
                RewardKind::SubPool {
                    pool: "vanished".to_string(),
                },
                1,
            ))
            .unwrap();
    }

    let mut rng = SmallRng::seed_from_u64(11);
    let drawn = pools.draw_from("outer", &mut rng).unwrap();
    let ctx = GrantContext::new(&platform, &pools);
    // Must not panic and must not grant.
    drawn.grant(
        &ActorId::new("alice"),
        &GrantFlags::default(),
        &ctx,
        &mut rng,
    );
    assert!(sink.deposits.lock().unwrap().is_empty());
    assert!(sink.given.lock().unwrap().is_empty());
}

#[test]
fn mutually_recursive_pools_terminate() {
    let (sink, platform) = sink_platform();
    let pools = PoolDirectory::new();
    for (id, target) in [("ouro", "boros"), ("boros", "ouro")] {
        let pool = pools.get_or_create(id);
        pool.write()
            .unwrap()
            .add(RewardVariant::new(
                RewardKind::SubPool {
                    pool: target.to_string(),
                },
                1,
            ))
            .unwrap();
    }

    let mut rng = SmallRng::seed_from_u64(11);
    let drawn = pools.draw_from("ouro", &mut rng).unwrap();
    let ctx = GrantContext::new(&platform, &pools);
    drawn.grant(
        &ActorId::new("alice"),
        &GrantFlags::default(),
        &ctx,
        &mut rng,
    );
    assert!(sink.deposits.lock().unwrap().is_empty());
}

#[test]
fn gaussian_serializes_with_absent_bounds_omitted() {
    let range = GaussianRange {
        mean: 3.0,
        std_dev: 1.0,
        min: None,
        max: Some(6.0),
    };
    let value = serde_json::to_value(range).unwrap();
    let map = value.as_object().unwrap();
    assert!(map.contains_key("mean"));
    assert!(map.contains_key("stdDev"));
    assert!(!map.contains_key("min"));
    assert!(map.contains_key("max"));
}
