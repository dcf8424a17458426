use roster::{AssignmentStep, DispatchConfig, DispatchInput, Engine, Error, Gender, Level};

fn fixture() -> DispatchInput {
    serde_json::from_value(serde_json::json!({
        "leaders": [
            { "class_name": "初級", "group_id": 1, "gender": "男", "full_name": "王大同" },
            { "class_name": "初級", "group_id": 2, "gender": "男", "full_name": "李正道",
              "dharma_name": "見性" },
            { "class_name": "中級", "group_id": 1, "gender": "female", "full_name": "陳靜如" }
        ],
        "candidates": [
            { "id": 1001, "full_name": "張三", "gender": "M",
              "previous": { "class_name": "基礎", "group_id": 4, "senior_name": "李正道",
                            "deacon": "小趙" },
              "upgrade": { "declared_classes": ["初級"] } },
            { "full_name": "周四", "gender": "male",
              "questionnaire": { "desired_class": "初級", "introducer": "張三" } },
            { "full_name": "吳五", "gender": "男",
              "questionnaire": { "desired_class": "初級", "introducer": "見性" } },
            { "full_name": "鄭六", "gender": "男",
              "questionnaire": { "desired_class": "初級" } },
            { "full_name": "林七", "gender": "女",
              "questionnaire": { "desired_class": "中級", "gender": "male" } }
        ]
    }))
    .unwrap()
}

#[test]
fn dispatches_json_input() {
    let report = Engine::new().dispatch(&fixture()).unwrap();
    assert_eq!(report.placed_count(), 5);

    let class = report.class("初級", Gender::Male).unwrap();
    let group2 = class.group(2).unwrap();
    assert_eq!(group2.dharma_name.as_deref(), Some("見性"));
    let ids: Vec<u64> = group2.members.iter().map(|m| m.candidate.id).collect();
    assert_eq!(ids[0], 1001);
    assert_eq!(group2.members[0].deacon.as_deref(), Some("小趙"));
    assert_eq!(group2.members[0].step, AssignmentStep::UpgradeFollowing);
    assert_eq!(group2.members[1].candidate.full_name, "周四");
    assert_eq!(group2.members[2].candidate.full_name, "吳五");

    // Newcomers without ids got synthetic ones above the configured base.
    assert!(ids[1..].iter().all(|&id| id >= 900_000));

    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.level == Level::Warning && d.message.contains("問卷性別"))
    );
}

#[test]
fn report_serializes_steps_and_levels() {
    let report = Engine::new().dispatch(&fixture()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    let first = &json["classes"][0];
    assert_eq!(first["class_name"], "初級");
    assert_eq!(first["groups"][1]["members"][0]["step"], "UPGRADE_FOLLOWING");
    assert_eq!(json["diagnostics"][0]["level"], "WARNING");
}

#[test]
fn config_controls_synthetic_ids() {
    let config = DispatchConfig::default()
        .with_override("synthetic_id_base", serde_json::json!(5000))
        .unwrap();
    let engine = Engine::new().with_config(config);
    let report = engine.dispatch(&fixture()).unwrap();
    let (_, group) = report.placement_of(5000).unwrap();
    assert_eq!(group.group_id, 2);
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let config = DispatchConfig {
        max_iterations: 0,
        ..DispatchConfig::default()
    };
    let err = Engine::new()
        .with_config(config)
        .dispatch(&fixture())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn check_reports_load_diagnostics_only() {
    let mut input = fixture();
    input.candidates[1].id = Some(1001);
    let diagnostics = Engine::new().check(&input).unwrap();
    assert_eq!(diagnostics.count(Level::Warning), 1);
}
