use aphylo::{
    AnnotationMatrix, BetaPrior, ChainConfig, ModelParameters, NodeType, PARAMETER_NAMES,
    PhyloObjective, PriorConfig, PrunerHandle, RootPrior, SummaryOptions, TreeTopology, run_chain,
    summarize_chain,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ((3, 4)1, (5, (7, 8)6)2)0
    let topology = TreeTopology::from_edges(
        &[(0, 1), (0, 2), (1, 3), (1, 4), (2, 5), (2, 6), (6, 7), (6, 8)],
        9,
    )?;
    let annotations = AnnotationMatrix::from_codes(&[
        vec![9, 9],
        vec![9, 9],
        vec![9, 9],
        vec![1, 0],
        vec![1, 9],
        vec![0, 1],
        vec![9, 9],
        vec![0, 1],
        vec![1, 1],
    ])?;
    let mut node_types = vec![NodeType::Speciation; 9];
    node_types[6] = NodeType::Duplication;

    let mut handle = PrunerHandle::new(topology, annotations, node_types)?;
    println!(
        "Tree: nodes={}, tips={}, annotated tips={}, traits={}",
        handle.n_nodes(),
        handle.n_tips(),
        handle.n_annotated(),
        handle.n_traits()
    );

    // Missing leaves have zero probability under perfect reporting (eta = 1).
    let params = ModelParameters {
        eta: [0.9, 0.9],
        root: RootPrior::Stationary,
        ..ModelParameters::default()
    };
    let posterior = handle.posterior(&params)?;
    for node in 0..handle.n_nodes() {
        println!(
            "node {node}: P(trait 0)={:.3}, P(trait 1)={:.3}",
            posterior.trait_probability(node, 0),
            posterior.trait_probability(node, 1)
        );
    }

    let mut objective =
        PhyloObjective::new(handle, PriorConfig::shared(BetaPrior::new(2.0, 9.0)))?;
    let bounds = PhyloObjective::default_bounds()?;
    let mut theta0 = PhyloObjective::pack(&params);
    theta0[8] = 0.5;

    let chain = run_chain(
        &mut objective,
        &theta0,
        &bounds,
        ChainConfig {
            iterations: 2_000,
            scale: 0.05,
            seed: 2_026,
            ..ChainConfig::default()
        },
    )?;
    let summary = summarize_chain(
        &chain,
        &PARAMETER_NAMES,
        SummaryOptions {
            burn_in: 500,
            thin: 5,
        },
    )?;

    println!(
        "Sampler: retained draws={}, acceptance rate={:.2}",
        summary.draw_count, summary.acceptance_rate
    );
    for parameter in &summary.parameters {
        println!(
            "{:>6} mean={:.3}, 95% CrI [{:.3}, {:.3}], ESS={:.1}",
            parameter.name,
            parameter.mean,
            parameter.q025,
            parameter.q975,
            parameter.effective_sample_size
        );
    }
    if let Some(pi) = summary.parameter("Pi") {
        println!("root prior Pi median={:.3}", pi.q50);
    }

    Ok(())
}
