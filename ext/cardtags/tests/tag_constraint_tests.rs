mod common;

use candle_core::{DType, Device, Tensor};
use cardtags::{
    CardError, CardExtractor, CardFields, GenerationConfig, Grammar, LogitsSource, Tag,
    TagConstraint, UnseededPolicy,
};

fn acme() -> CardFields {
    CardFields::new("Acme", "Taro", "t@a.co", "000", "Tokyo").unwrap()
}

#[test]
fn test_acme_scenario() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let constraint = TagConstraint::new(Grammar::business_card(), tags);
    let width = tokenizer.vocab_size();

    let target = acme().to_tagged_string();
    assert_eq!(
        target,
        "<s><s_company>Acme</s_company><s_name>Taro</s_name><s_email>t@a.co</s_email>\
         <s_phone_number>000</s_phone_number><s_address>Tokyo</s_address></s>"
    );

    let after_start = vec![tags.id(Tag::Start)];
    let allowed = constraint.allowed_tags(&after_start).unwrap();
    assert_eq!(allowed.iter().collect::<Vec<_>>(), vec![Tag::CompanyOpen]);

    let after_company = vec![tags.id(Tag::Start), tags.id(Tag::CompanyOpen)];
    let allowed = constraint.allowed_tags(&after_company).unwrap();
    assert_eq!(allowed.iter().collect::<Vec<_>>(), vec![Tag::CompanyClose]);

    let scores = Tensor::zeros((1, width), DType::F32, &Device::Cpu).unwrap();
    let constrained = constraint
        .constrain(&[after_company], &scores)
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();
    assert_eq!(constrained[0][tags.id(Tag::NameClose) as usize], f32::NEG_INFINITY);
    assert_eq!(constrained[0][tags.id(Tag::CompanyClose) as usize], 0.0);
}

#[test]
fn test_suppression_for_every_tag() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let grammar = Grammar::business_card();
    let constraint = TagConstraint::new(grammar.clone(), tags);
    let width = tokenizer.vocab_size();
    let original: Vec<f32> = (0..width).map(|i| (i % 7) as f32 - 3.0).collect();

    for tag in Tag::ALL.into_iter().filter(|t| *t != Tag::End) {
        let next = grammar.next_allowed(tag).unwrap().iter().next().unwrap();
        let history = vec![tags.id(Tag::Start), 5, tags.id(tag), 6];
        let mut scores = original.clone();
        constraint.constrain_row(&history, &mut scores).unwrap();

        for (i, (before, after)) in original.iter().zip(&scores).enumerate() {
            match tags.tag(i as u32) {
                Some(t) if t != next => assert_eq!(*after, f32::NEG_INFINITY),
                _ => assert_eq!(after, before),
            }
        }
    }
}

#[test]
fn test_half_precision_scores() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let constraint = TagConstraint::new(Grammar::business_card(), tags);
    let width = tokenizer.vocab_size();

    let scores = Tensor::ones((2, width), DType::F16, &Device::Cpu).unwrap();
    let histories = vec![vec![tags.id(Tag::Start)], vec![tags.id(Tag::NameOpen), 3]];
    let constrained = constraint.constrain(&histories, &scores).unwrap();
    assert_eq!(constrained.dtype(), DType::F16);

    let rows = constrained.to_vec2::<half::f16>().unwrap();
    assert_eq!(rows[0][tags.id(Tag::End) as usize], half::f16::NEG_INFINITY);
    assert_eq!(rows[0][tags.id(Tag::CompanyOpen) as usize], half::f16::ONE);
    assert_eq!(rows[1][tags.id(Tag::CompanyOpen) as usize], half::f16::NEG_INFINITY);
    assert_eq!(rows[1][tags.id(Tag::NameClose) as usize], half::f16::ONE);
}

#[test]
fn test_suppressed_tokens_have_zero_probability() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let constraint = TagConstraint::new(Grammar::business_card(), tags);
    let width = tokenizer.vocab_size();

    let mut logits = vec![0.0f32; width];
    logits[tags.id(Tag::End) as usize] = 50.0;
    let scores = Tensor::from_vec(logits, (1, width), &Device::Cpu).unwrap();
    let constrained = constraint.constrain(&[vec![tags.id(Tag::Start)]], &scores).unwrap();

    let probs = candle_nn::ops::softmax_last_dim(&constrained)
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();
    assert_eq!(probs[0][tags.id(Tag::End) as usize], 0.0);
    let total: f32 = probs[0].iter().sum();
    assert!((total - 1.0).abs() < 1e-4);
}

#[test]
fn test_unseeded_policy_from_config() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let reject = TagConstraint::new(Grammar::business_card(), tags);
    assert!(matches!(reject.allowed_tags(&[]), Err(CardError::NoActiveTag)));

    let force = reject.with_policy(UnseededPolicy::ForceStart);
    let allowed = force.allowed_tags(&[]).unwrap();
    assert_eq!(allowed.iter().collect::<Vec<_>>(), vec![Tag::Start]);
}

/// Replays a fixed target, but always scores `</s>` highest.
struct EagerToStop {
    target: Vec<u32>,
    end: u32,
    width: usize,
}

impl LogitsSource for EagerToStop {
    fn next_logits(&mut self, tokens: &[u32]) -> cardtags::Result<Tensor> {
        let mut logits = vec![0.0f32; self.width];
        if let Some(next) = self.target.get(tokens.len()) {
            logits[*next as usize] = 5.0;
        }
        logits[self.end as usize] = 8.0;
        Ok(Tensor::from_vec(logits, self.width, &Device::Cpu)?)
    }
}

#[test]
fn test_extraction_ignores_premature_stop() {
    let tokenizer = common::tag_tokenizer();
    let target = tokenizer.encode(&acme().to_tagged_string()).unwrap();
    let mut model = EagerToStop {
        end: tokenizer.tags().id(Tag::End),
        width: tokenizer.vocab_size(),
        target: target.clone(),
    };

    let mut extractor = CardExtractor::new(tokenizer, &GenerationConfig::default());
    let card = extractor.extract(&mut model).unwrap();

    assert!(card.sequence.finished);
    assert_eq!(card.sequence.tokens, target);
    assert_eq!(card.fields, acme());
}

/// Uniform scores over the whole vocabulary.
struct Uniform {
    width: usize,
}

impl LogitsSource for Uniform {
    fn next_logits(&mut self, _tokens: &[u32]) -> cardtags::Result<Tensor> {
        Ok(Tensor::zeros(self.width, DType::F32, &Device::Cpu)?)
    }
}

#[test]
fn test_sampled_tags_follow_the_chain() {
    let tokenizer = common::tag_tokenizer();
    let tags = *tokenizer.tags();
    let mut model = Uniform {
        width: tokenizer.vocab_size(),
    };

    for seed in 0..20 {
        let config = GenerationConfig {
            max_length: 200,
            temperature: 1.0,
            seed,
            ..Default::default()
        };
        let mut generation = cardtags::ConstrainedGeneration::new(
            TagConstraint::new(Grammar::business_card(), tags),
            &config,
        );
        let sequence = generation.generate(&mut model).unwrap();

        let emitted: Vec<Tag> = sequence.tokens.iter().filter_map(|id| tags.tag(*id)).collect();
        assert_eq!(emitted[..], Tag::ALL[..emitted.len()], "seed {seed}");
        assert_eq!(sequence.finished, emitted.last() == Some(&Tag::End));
    }
}
