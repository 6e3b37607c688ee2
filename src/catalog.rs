//! The default five-module curriculum.
//!
//! Ids are fixed so that seeding is repeatable and so that progress rows
//! written against one deployment stay valid after a reseed.

use tracing::info;
use uuid::Uuid;

use crate::store::{Store, StoreResult};
use crate::types::{Module, QuestionType, Scenario, SocraticQuestion};

pub struct ScenarioSeed {
    pub id: u128,
    pub title: &'static str,
    pub title_en: &'static str,
    pub category: &'static str,
    pub context: &'static str,
}

pub struct ModuleSeed {
    pub id: u128,
    pub slug: &'static str,
    pub title: &'static str,
    pub title_en: &'static str,
    pub description: &'static str,
    pub description_en: &'static str,
    pub techniques: &'static [&'static str],
    pub policy_context: &'static str,
    pub questions: &'static [(QuestionType, &'static str)],
    pub scenarios: &'static [ScenarioSeed],
}

use QuestionType::{Assumption, Clarification, Consequence, Exploration, Reflection};

pub const CURRICULUM: &[ModuleSeed] = &[
    ModuleSeed {
        id: 0x11111111_1111_1111_1111_111111111111,
        slug: "good-questions",
        title: "좋은 질문이 좋은 답을 만든다",
        title_en: "Good Questions Make Good Answers",
        description: "모호한 요청과 명확한 요청의 차이를 경험하고, 구체성과 맥락이 답변의 질을 어떻게 바꾸는지 배웁니다.",
        description_en: "Experience the gap between vague and clear requests and learn how specificity and context change the quality of an answer.",
        techniques: &["명확성", "구체성", "맥락 제공"],
        policy_context: "정책 연구 보고서 작성을 위한 기초 자료 조사",
        questions: &[
            (Exploration, "AI에게 질문할 때 무엇이 결과에 영향을 준다고 생각하나요?"),
            (Clarification, "'좋은 답변'이란 구체적으로 어떤 답변을 말씀하시는 건가요?"),
            (Assumption, "AI가 여러분의 상황을 이미 알고 있다고 가정하고 질문한 적은 없나요?"),
            (Consequence, "질문에 배경 정보를 더하면 답변은 어떻게 달라질까요?"),
        ],
        scenarios: &[
            ScenarioSeed {
                id: 0xa1111111_0000_0000_0000_000000000001,
                title: "저출산 대응 정책 자료 조사",
                title_en: "Researching low-fertility policy",
                category: "인구",
                context: "부서장이 다음 주 회의를 위해 최근 5년간 저출산 대응 정책의 주요 흐름을 정리해 달라고 요청했습니다.",
            },
            ScenarioSeed {
                id: 0xa1111111_0000_0000_0000_000000000002,
                title: "청년 주거 지원 현황 파악",
                title_en: "Mapping youth housing support",
                category: "주거",
                context: "청년 주거 지원 사업의 현황을 빠르게 파악해 내부 브리핑 자료를 만들어야 합니다.",
            },
        ],
    },
    ModuleSeed {
        id: 0x22222222_2222_2222_2222_222222222222,
        slug: "literature-review",
        title: "문헌 리뷰 효과적으로 하기",
        title_en: "Effective Literature Reviews",
        description: "AI로 선행 연구를 요약하고 분석하며 비교하는 방법을 익힙니다.",
        description_en: "Learn to summarize, analyze and compare prior research with an AI assistant.",
        techniques: &["요약", "분석", "비교"],
        policy_context: "정책 연구의 선행 연구 검토",
        questions: &[
            (Exploration, "문헌 리뷰에서 가장 시간이 많이 드는 부분은 무엇인가요?"),
            (Clarification, "AI에게 '요약해줘'라고만 하면 어떤 요약이 나올 것 같나요?"),
            (Assumption, "AI가 제시한 문헌 정보가 모두 정확하다고 믿어도 될까요?"),
            (Reflection, "요약의 범위와 형식을 미리 정해주면 무엇이 달라질까요?"),
        ],
        scenarios: &[
            ScenarioSeed {
                id: 0xa2222222_0000_0000_0000_000000000001,
                title: "기본소득 선행 연구 검토",
                title_en: "Reviewing basic income studies",
                category: "복지",
                context: "기본소득 실험에 관한 국내외 연구 10편을 검토하고 핵심 쟁점을 정리해야 합니다.",
            },
            ScenarioSeed {
                id: 0xa2222222_0000_0000_0000_000000000002,
                title: "탄소중립 정책 효과 연구 정리",
                title_en: "Summarizing carbon-neutrality evaluations",
                category: "환경",
                context: "지자체 탄소중립 정책의 효과를 분석한 연구들을 비교해 연구 공백을 찾아야 합니다.",
            },
        ],
    },
    ModuleSeed {
        id: 0x33333333_3333_3333_3333_333333333333,
        slug: "policy-comparison",
        title: "정책 비교 분석 요청하기",
        title_en: "Requesting Policy Comparisons",
        description: "비교 기준을 먼저 세우고 체계적인 평가를 요청하는 프롬프트를 연습합니다.",
        description_en: "Practice prompts that set comparison criteria first and ask for a systematic evaluation.",
        techniques: &["비교 분석", "기준 설정", "체계적 평가"],
        policy_context: "국내외 정책 사례 비교",
        questions: &[
            (Exploration, "두 정책을 비교할 때 무엇을 기준으로 삼으시나요?"),
            (Clarification, "비교 기준을 AI에게 알려주지 않으면 어떤 일이 생길까요?"),
            (Assumption, "모든 나라의 정책을 같은 기준으로 비교할 수 있다고 보시나요?"),
            (Consequence, "비교 결과를 표로 요청하면 보고서 작성에 어떤 도움이 될까요?"),
        ],
        scenarios: &[
            ScenarioSeed {
                id: 0xa3333333_0000_0000_0000_000000000001,
                title: "육아휴직 제도 국가별 비교",
                title_en: "Comparing parental leave across countries",
                category: "노동",
                context: "한국, 스웨덴, 일본의 육아휴직 제도를 비교해 개선 방향을 제안해야 합니다.",
            },
        ],
    },
    ModuleSeed {
        id: 0x44444444_4444_4444_4444_444444444444,
        slug: "data-interpretation",
        title: "데이터 해석 도움받기",
        title_en: "Getting Help Interpreting Data",
        description: "데이터를 설명하고 해석을 요청해 정책적 인사이트를 끌어내는 방법을 배웁니다.",
        description_en: "Learn to describe data, request an interpretation and draw policy insights.",
        techniques: &["데이터 설명", "해석 요청", "인사이트 도출"],
        policy_context: "통계 자료 기반 정책 분석",
        questions: &[
            (Exploration, "표나 그래프를 AI에게 보여줄 때 무엇을 함께 알려주시나요?"),
            (Clarification, "'이 데이터를 분석해줘'와 '이 추세의 원인을 설명해줘'는 어떻게 다를까요?"),
            (Assumption, "AI의 해석이 데이터의 한계를 충분히 고려한다고 볼 수 있을까요?"),
            (Consequence, "해석과 함께 주의사항을 요청하면 결과를 어떻게 활용할 수 있을까요?"),
        ],
        scenarios: &[
            ScenarioSeed {
                id: 0xa4444444_0000_0000_0000_000000000001,
                title: "지역별 고용률 추이 해석",
                title_en: "Interpreting regional employment trends",
                category: "고용",
                context: "최근 10년간 시도별 고용률 자료에서 의미 있는 변화를 찾아 정책 시사점을 도출해야 합니다.",
            },
        ],
    },
    ModuleSeed {
        id: 0x55555555_5555_5555_5555_555555555555,
        slug: "policy-drafting",
        title: "정책 문서 작성 지원받기",
        title_en: "Drafting Policy Documents",
        description: "문서 구조를 제시하고 초안을 받은 뒤 목표에 맞게 수정을 요청하는 과정을 연습합니다.",
        description_en: "Practice giving a structure, getting a draft and requesting targeted revisions.",
        techniques: &["구조화", "초안 작성", "수정 요청"],
        policy_context: "정책 제안서 및 보고서 작성",
        questions: &[
            (Exploration, "정책 문서를 쓸 때 AI에게 가장 먼저 무엇을 알려주고 싶으신가요?"),
            (Clarification, "원하는 문서의 구조를 미리 제시하면 초안이 어떻게 달라질까요?"),
            (Assumption, "AI가 쓴 첫 초안을 그대로 써도 된다고 생각하시나요?"),
            (Reflection, "수정 요청을 구체적으로 하려면 어떤 정보가 필요할까요?"),
        ],
        scenarios: &[
            ScenarioSeed {
                id: 0xa5555555_0000_0000_0000_000000000001,
                title: "고령자 디지털 역량 강화 정책 제안서",
                title_en: "Proposal for senior digital literacy",
                category: "디지털",
                context: "고령자의 디지털 역량 강화를 위한 정책 제안서 초안을 2주 안에 제출해야 합니다.",
            },
        ],
    },
];

impl ModuleSeed {
    pub fn module_id(&self) -> Uuid {
        Uuid::from_u128(self.id)
    }

    pub fn to_module(&self, order_index: i32, prerequisite: Option<Uuid>) -> Module {
        Module {
            id: self.module_id(),
            slug: self.slug.to_string(),
            title: self.title.to_string(),
            title_en: Some(self.title_en.to_string()),
            description: Some(self.description.to_string()),
            description_en: Some(self.description_en.to_string()),
            techniques: self.techniques.iter().map(|t| t.to_string()).collect(),
            policy_context: self.policy_context.to_string(),
            order_index,
            is_active: true,
            prerequisite_module_id: prerequisite,
        }
    }

    pub fn socratic_questions(&self) -> Vec<SocraticQuestion> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, (question_type, text))| SocraticQuestion {
                module_id: self.module_id(),
                order_index: i as i32 + 1,
                question_type: *question_type,
                question_text: text.to_string(),
            })
            .collect()
    }

    pub fn to_scenarios(&self) -> Vec<Scenario> {
        self.scenarios
            .iter()
            .map(|s| Scenario {
                id: Uuid::from_u128(s.id),
                module_id: self.module_id(),
                title: s.title.to_string(),
                title_en: Some(s.title_en.to_string()),
                category: s.category.to_string(),
                context: s.context.to_string(),
                context_en: None,
                is_active: true,
            })
            .collect()
    }
}

/// The curriculum as modules chained by prerequisite in catalog order.
pub fn modules() -> Vec<Module> {
    let mut previous = None;
    CURRICULUM
        .iter()
        .enumerate()
        .map(|(i, seed)| {
            let module = seed.to_module(i as i32 + 1, previous);
            previous = Some(module.id);
            module
        })
        .collect()
}

/// Write the curriculum into `store`. Safe to run repeatedly.
pub async fn seed(store: &dyn Store) -> StoreResult<usize> {
    for (seed, module) in CURRICULUM.iter().zip(modules()) {
        store.upsert_module(&module).await?;
        for scenario in seed.to_scenarios() {
            store.upsert_scenario(&scenario).await?;
        }
        store
            .replace_questions(module.id, &seed.socratic_questions())
            .await?;
        info!(module = seed.slug, "seeded module");
    }
    Ok(CURRICULUM.len())
}
