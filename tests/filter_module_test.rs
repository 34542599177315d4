/// 滤波器模块综合演示测试
///
/// 展示如何使用 filters 模块中的各个组件，
/// 并覆盖大厅锚点布局下的端到端场景

#[cfg(test)]
mod tests {
    use rangenav::filters::*;

    fn hall_anchors() -> Vec<Anchor> {
        vec![
            Anchor::new(1, 290.0, 300.0),
            Anchor::new(2, 550.0, 300.0),
            Anchor::new(3, 550.0, 30.0),
        ]
    }

    fn exact_distances(anchors: &[Anchor], x: f64, y: f64) -> Vec<f64> {
        anchors.iter().map(|a| a.distance_to(x, y)).collect()
    }

    #[test]
    fn test_filter_module_anchor_set() {
        // 创建锚点集合
        let mut anchors = AnchorSet::new();
        anchors.add_anchor(Anchor::new(1, 290.0, 300.0));
        anchors.add_anchor(Anchor::new(2, 550.0, 300.0));
        anchors.add_anchor(Anchor::new(3, 550.0, 30.0));

        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors.active_count(), 3);

        // 锚点掉线后活跃子序列缩短但保持顺序
        anchors.set_active(2, false);
        let active = anchors.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, 1);
        assert_eq!(active[1].id, 3);
    }

    #[test]
    fn test_filter_module_configuration_json() {
        // 配置经 JSON 往返（设置界面的存取格式）
        let config = FilterConfiguration {
            filter_kind: FilterKind::Particle,
            particle_kind: ParticleKind::Regularized,
            particle_count: 800,
            resample_threshold: 400.0,
            rng_seed: Some(2024),
            ..FilterConfiguration::default()
        };
        assert!(config.is_valid());

        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: FilterConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_filter_module_multilateration_seed() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut rng = StdRng::seed_from_u64(5);
        let anchors = [
            Anchor::new(1, 0.0, 0.0),
            Anchor::new(2, 10.0, 0.0),
            Anchor::new(3, 0.0, 10.0),
        ];
        let distances = exact_distances(&anchors, 3.0, 4.0);
        let pos = multilateration::seed_position(&anchors, &distances, &mut rng).unwrap();
        assert!((pos.x - 3.0).abs() < 1e-9);
        assert!((pos.y - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_module_ekf_end_to_end_scenario() {
        // 大厅场景：3 个活跃锚点 (290,300) (550,300) (550,30)，
        // 测距 {150, 260, 300}，零加速度跑一个 predict/update 周期
        let anchors = hall_anchors();
        let distances = vec![150.0, 260.0, 300.0];
        let config = FilterConfiguration {
            filter_kind: FilterKind::ExtendedKalman,
            rng_seed: Some(1),
            ..FilterConfiguration::default()
        };

        let frame = MeasurementFrame::new(distances.clone(), (0.0, 0.0));
        let mut filter = PositionFilter::from_configuration(&config, &anchors, &frame)
            .unwrap()
            .unwrap();
        let seed = filter.estimate(anchors.len());

        filter.predict((0.0, 0.0));
        filter.update(&anchors, &frame).unwrap();
        let estimate = filter.estimate(anchors.len());

        // 结果应停留在最小二乘种子的测量不确定度邻域内
        let drift = ((estimate.x - seed.x).powi(2) + (estimate.y - seed.y).powi(2)).sqrt();
        assert!(drift < 120.0, "单周期漂移过大: {}", drift);
        // 且落在锚点围成的大致区域内
        assert!(estimate.x > 150.0 && estimate.x < 700.0);
        assert!(estimate.y > 0.0 && estimate.y < 450.0);
    }

    #[test]
    fn test_filter_module_kalman_tracks_stationary_tag() {
        let anchors = hall_anchors();
        let truth = (400.0, 200.0);
        let distances = exact_distances(&anchors, truth.0, truth.1);
        let config = FilterConfiguration {
            filter_kind: FilterKind::Kalman,
            rng_seed: Some(6),
            ..FilterConfiguration::default()
        };

        let frame = MeasurementFrame::new(distances, (0.0, 0.0));
        let mut filter = PositionFilter::from_configuration(&config, &anchors, &frame)
            .unwrap()
            .unwrap();

        for _ in 0..20 {
            filter.predict(frame.acceleration);
            filter.update(&anchors, &frame).unwrap();
        }

        let estimate = filter.estimate(anchors.len());
        let error = ((estimate.x - truth.0).powi(2) + (estimate.y - truth.1).powi(2)).sqrt();
        assert!(error < 30.0, "静止标签跟踪误差: {}", error);
        assert_eq!(estimate.filter, "kalman");
    }

    #[test]
    fn test_filter_module_particle_filter_visualization_output() {
        let anchors = hall_anchors();
        let distances = exact_distances(&anchors, 400.0, 200.0);
        let config = FilterConfiguration {
            filter_kind: FilterKind::Particle,
            particle_kind: ParticleKind::Regularized,
            particle_count: 400,
            resample_threshold: 200.0,
            rng_seed: Some(8),
            ..FilterConfiguration::default()
        };

        let frame = MeasurementFrame::new(distances, (0.0, 0.0));
        let mut filter = PositionFilter::from_configuration(&config, &anchors, &frame)
            .unwrap()
            .unwrap();

        for _ in 0..10 {
            filter.predict(frame.acceleration);
            filter.update(&anchors, &frame).unwrap();
        }

        // 粒子云供渲染层可视化，数量恒定
        let particles = filter.particles().unwrap();
        assert_eq!(particles.len(), 400);

        let estimate = filter.estimate(anchors.len());
        assert!(estimate.particles.is_some());
        let error = ((estimate.x - 400.0).powi(2) + (estimate.y - 200.0).powi(2)).sqrt();
        assert!(error < 60.0, "粒子滤波估计误差: {}", error);
    }

    #[test]
    fn test_filter_module_single_anchor_degenerate_start() {
        // 只有一个锚点也能启动：种子落在测距圆上
        let anchors = vec![Anchor::new(1, 100.0, 100.0)];
        let frame = MeasurementFrame::new(vec![80.0], (0.0, 0.0));
        let config = FilterConfiguration {
            filter_kind: FilterKind::ExtendedKalman,
            rng_seed: Some(2),
            ..FilterConfiguration::default()
        };

        let filter = PositionFilter::from_configuration(&config, &anchors, &frame)
            .unwrap()
            .unwrap();
        let estimate = filter.estimate(1);
        let radius = anchors[0].distance_to(estimate.x, estimate.y);
        assert!((radius - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_filter_module_collinear_anchors_rejected() {
        let anchors = vec![
            Anchor::new(1, 0.0, 0.0),
            Anchor::new(2, 100.0, 0.0),
            Anchor::new(3, 200.0, 0.0),
        ];
        let frame = MeasurementFrame::new(vec![50.0, 60.0, 150.0], (0.0, 0.0));
        let config = FilterConfiguration {
            rng_seed: Some(4),
            ..FilterConfiguration::default()
        };

        let result = PositionFilter::from_configuration(&config, &anchors, &frame);
        assert_eq!(result.err(), Some(FilterError::UnderdeterminedGeometry));
    }
}
